//! Host and a simulated peripheral talking over loopback

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use mcu_remote::protocol::{FunctionSetup, IntSetup, IntUpdate};
use mcu_remote::registry::TileTarget;
use mcu_remote::{DevicePacket, Host, HostCommand, HostConfig, TransportConfig};

/// Peripheral loop: answer the first beacon or setup request with a fixed set of objects,
/// then echo variable writes back as updates.
fn run_device(socket: &UdpSocket) -> std::io::Result<()> {
    let objects = [
        DevicePacket::SetupFunction(FunctionSetup {
            index: 0,
            name: "Blink".to_owned(),
        }),
        DevicePacket::SetupInt(IntSetup {
            index: 0,
            value: 20,
            min: 0,
            max: 100,
            flags: 0x0042_0000,
            name: "Brightness".to_owned(),
        }),
    ];
    let mut values = vec![20i32];
    let mut announced = false;
    let mut buf = [0u8; 64];

    loop {
        let (len, host) = socket.recv_from(&mut buf)?;
        let Ok(command) = HostCommand::decode(&buf[..len]) else {
            continue;
        };
        match command {
            HostCommand::Beacon if announced => {}
            HostCommand::Beacon | HostCommand::ForceSetup => {
                for packet in &objects {
                    socket.send_to(&packet.encode(), host)?;
                }
                announced = true;
            }
            HostCommand::SetVariable { index, value } => {
                if let Some(slot) = values.get_mut(usize::from(index)) {
                    *slot = value;
                }
                send_update(socket, host, &values)?;
            }
            HostCommand::RequestUpdate => send_update(socket, host, &values)?,
            HostCommand::CallFunction { index } => println!("  [device] function {index} called"),
        }
    }
}

fn send_update(socket: &UdpSocket, host: SocketAddr, values: &[i32]) -> std::io::Result<()> {
    let update = DevicePacket::UpdateInt(IntUpdate {
        start: 0,
        values: values.to_vec(),
    });
    socket.send_to(&update.encode(), host).map(|_| ())
}

fn print_registry(host: &Host) {
    let snapshot = host.snapshot();
    println!("  peer: {:?}, session: {:?}", snapshot.peer, snapshot.session);
    for (tile, target) in snapshot.resolved_tiles() {
        let layout = tile.layout;
        match target {
            TileTarget::SetupRequest => println!("  tile [setup]"),
            TileTarget::Function(function) => {
                println!("  tile fn  {:<12} at ({},{})", function.name, layout.x, layout.y);
            }
            TileTarget::IntVariable(var) => println!(
                "  tile int {:<12} = {} [{}..{}] at ({},{})",
                var.name, var.value, var.min, var.max, layout.x, layout.y
            ),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("MCU Remote Device Simulation");
    println!("============================\n");

    let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))?;
    let device_port = device.local_addr()?.port();
    thread::spawn(move || {
        if let Err(err) = run_device(&device) {
            eprintln!("device stopped: {err}");
        }
    });

    let mut host = Host::start(HostConfig {
        transport: TransportConfig {
            port: 0,
            local_ip: Some(Ipv4Addr::LOCALHOST),
            broadcast_ip: Some(Ipv4Addr::LOCALHOST),
            broadcast_port: Some(device_port),
            ..TransportConfig::default()
        },
        beacon_interval: Duration::from_millis(200),
        ..HostConfig::default()
    })?;
    println!("Host listening on {}", host.local_endpoint());

    thread::sleep(Duration::from_millis(500));
    println!("\nAfter discovery:");
    print_registry(&host);

    host.commands().set_variable(0, " 75 ")?;
    host.commands().call_function(0)?;
    thread::sleep(Duration::from_millis(200));
    println!("\nAfter set_variable(0, 75):");
    print_registry(&host);

    host.commands().force_setup()?;
    thread::sleep(Duration::from_millis(200));
    println!("\nAfter force_setup:");
    print_registry(&host);

    host.shutdown();
    println!("\nHost stopped");
    Ok(())
}
