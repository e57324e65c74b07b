//! Simulated GT06 terminal
//!
//! Logs in, then reports one location, one alarm and one heartbeat.
//! Usage: `cargo run --example tracker_client [config.json]`

use std::error::Error;
use std::time::Duration;
use tracing::{info, warn};
use gt06::{
    tcp::Gt06TcpClient, AlarmReport, CellInfo, ClientConfig, Coordinate, CourseFlags, DateTime,
    GpsInfo, Heartbeat, LocationReport, Message, TerminalInfo, Voltage,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    info!("Starting GT06 terminal {} -> {}", config.identity, config.server_addr);

    let mut client = Gt06TcpClient::connect_with_config(&config).await?;

    // Abort unless the server acknowledges the login
    client.login(&config.login()?).await?;

    let gps = GpsInfo {
        speed: 60,
        course_status: gt06::pack_course_status(
            0x234,
            CourseFlags::POSITIONED,
        )?,
        ..GpsInfo::new(
            DateTime::new(24, 1, 12, 12, 30, 45),
            Coordinate::latitude(10.762622)?,
            Coordinate::longitude(106.660172)?,
        )
    };
    let cell = CellInfo {
        mcc: 452,
        mnc: 1,
        lac: 12345,
        cell_id: 67890,
    };

    let location = LocationReport {
        gps,
        cell,
        acc: 1,
        upload_mode: 0x00,
        realtime_reupload: 0x01,
        odometer: 123_456,
    };
    let serial = client.send(&Message::Location(location)).await?;
    info!("Sent location report, serial {}", serial);

    let alarm = AlarmReport {
        gps,
        cell,
        acc: 1,
        terminal_info: TerminalInfo::DEFENCE_ACTIVE,
        battery_level: 0x05,
        signal_strength: 0x03,
        alarm_language: 0x0102,
        odometer: 123_456,
    };
    let serial = client.send(&Message::Alarm(alarm)).await?;
    info!("Sent alarm report, serial {}", serial);

    let heartbeat = Heartbeat {
        terminal_info: TerminalInfo::GPS_TRACKING | TerminalInfo::from_bits_retain(0b0010_0000),
        external_voltage: Voltage::from_volts(12.34)?,
        battery_level: 0x05,
        signal_strength: 0x03,
        language_port_status: 0x0102,
    };
    let serial = client.send(&Message::Heartbeat(heartbeat)).await?;
    info!("Sent heartbeat, serial {}", serial);

    // Drain acknowledgments for the three reports
    for _ in 0..3 {
        match tokio::time::timeout(Duration::from_secs(2), client.recv()).await {
            Ok(Ok(Some(frame))) => info!("Server acknowledged {:?}, serial {}", frame.kind, frame.serial),
            Ok(Ok(None)) => {
                info!("Server closed the connection");
                break;
            }
            Ok(Err(e)) => {
                warn!("Bad response: {}", e);
                break;
            }
            Err(_) => {
                info!("No more responses from server");
                break;
            }
        }
    }

    client.close().await?;
    info!("Terminal session completed");
    Ok(())
}
