mod config;
mod control;
mod fan;
mod mqtt;
mod policy;
mod sensor;

use tracing::{error, info};

use control::ControlLoop;
use fan::sysfs::SysfsFan;
use mqtt::client::MqttClient;
use sensor::hwmon::HwmonSensor;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting serverrack-fan (mqtt={}:{}, policy={}, period={}s)",
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.control.policy,
        config.control.tick_period_secs,
    );
    info!(
        "  Sensor: {} | Fan: {}",
        config.sensor.temp_path.display(),
        config.fan.pwm_path.display(),
    );

    // A fan we cannot drive is fatal; never run the loop without it.
    let fan = match SysfsFan::open(&config.fan.pwm_path) {
        Ok(f) => f,
        Err(e) => {
            error!("Fan initialisation error: {}", e);
            std::process::exit(1);
        }
    };

    let sensor = HwmonSensor::new(&config.sensor.temp_path, config.sensor.humidity_path.clone());

    // Create MQTT client and spawn its event loop; the control loop only enqueues.
    let mqtt_client = MqttClient::new(&config.mqtt);
    let publisher = mqtt_client.publisher();
    let mqtt_handle = tokio::spawn(mqtt_client.run());

    let mut control = ControlLoop::new(sensor, fan, publisher, config.control.policy)
        .with_fault_limit(config.control.sensor_fault_limit);

    control
        .run(config.control.tick_period(), shutdown_signal())
        .await;

    mqtt_handle.abort();
    info!("serverrack-fan stopped");
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = async {
            let mut sigterm = tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate()
            ).expect("Failed to register SIGTERM handler");
            sigterm.recv().await;
        } => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
