use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::policy::DutyPercent;
use crate::sensor::Reading;

use super::{TelemetryMessage, TelemetryPublisher, telemetry_messages};

/// Temperature and fan speed, always queued and sent as one unit.
type TelemetryPair = [TelemetryMessage; 2];

/// Pending pairs waiting for the MQTT task.
const TELEMETRY_QUEUE: usize = 16;

/// Owns the broker connection. Created once at startup; hand out
/// [`MqttPublisher`]s with [`MqttClient::publisher`] and drive the
/// connection with [`MqttClient::run`].
pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    telemetry_tx: mpsc::Sender<TelemetryPair>,
    telemetry_rx: mpsc::Receiver<TelemetryPair>,
}

impl MqttClient {
    pub fn new(config: &MqttConfig) -> Self {
        let mut mqttopts =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        mqttopts.set_keep_alive(Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            mqttopts.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);
        let (telemetry_tx, telemetry_rx) = mpsc::channel(TELEMETRY_QUEUE);

        Self {
            client,
            eventloop,
            telemetry_tx,
            telemetry_rx,
        }
    }

    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            telemetry_tx: self.telemetry_tx.clone(),
        }
    }

    /// Run the MQTT event loop alongside the telemetry forwarder. Never
    /// returns; abort the task to stop it.
    pub async fn run(self) {
        let Self {
            client,
            eventloop,
            telemetry_rx,
            ..
        } = self;
        tokio::join!(drive(eventloop), forward(client, telemetry_rx));
    }
}

/// Connects, flushes queued publishes, and reconnects after errors.
async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("Connected to MQTT broker");
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                warn!("Disconnected from MQTT broker");
            }
            Ok(Event::Incoming(Incoming::PubAck(ack))) => {
                debug!("Broker acknowledged publish {}", ack.pkid);
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}. Reconnecting...", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Hands each pair to the client, waiting for request-queue space so the
/// second message is never dropped after the first went out.
async fn forward(client: AsyncClient, mut telemetry_rx: mpsc::Receiver<TelemetryPair>) {
    while let Some(pair) = telemetry_rx.recv().await {
        for message in pair {
            debug!("Publishing {}: {}", message.topic, message.payload);
            if let Err(e) = client
                .publish(message.topic, QoS::AtLeastOnce, false, message.payload)
                .await
            {
                error!("MQTT client closed, dropping {}: {}", message.topic, e);
                return;
            }
        }
    }
}

/// Queues telemetry for the MQTT task without waiting for the broker.
#[derive(Clone)]
pub struct MqttPublisher {
    telemetry_tx: mpsc::Sender<TelemetryPair>,
}

impl TelemetryPublisher for MqttPublisher {
    fn publish(&mut self, reading: &Reading, duty: DutyPercent) {
        match self.telemetry_tx.try_send(telemetry_messages(reading, duty)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Telemetry queue full, dropping this tick's readings");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Telemetry channel closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{Publish, Request};

    fn reading(celsius: f32) -> Reading {
        Reading {
            celsius,
            humidity: None,
        }
    }

    fn expect_publish(request: Request) -> Publish {
        match request {
            Request::Publish(publish) => publish,
            other => panic!("expected a publish, got {other:?}"),
        }
    }

    #[test]
    fn publisher_queues_the_pair_as_one_unit() {
        let (telemetry_tx, mut telemetry_rx) = mpsc::channel(1);
        let mut publisher = MqttPublisher { telemetry_tx };

        publisher.publish(&reading(23.4), DutyPercent::new(65));
        // Queue is full: the whole second pair is dropped, never half of it.
        publisher.publish(&reading(24.0), DutyPercent::new(70));

        let [temp, fan] = telemetry_rx.try_recv().unwrap();
        assert_eq!(temp.payload, "23.4");
        assert_eq!(fan.payload, "65");
        assert!(telemetry_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn forward_publishes_qos1_unretained_in_order() {
        let (request_tx, request_rx) = flume::bounded(10);
        let client = AsyncClient::from_senders(request_tx);
        let (telemetry_tx, telemetry_rx) = mpsc::channel(TELEMETRY_QUEUE);
        let mut publisher = MqttPublisher { telemetry_tx };

        publisher.publish(&reading(23.4), DutyPercent::new(65));
        drop(publisher);
        forward(client, telemetry_rx).await;

        let temp = expect_publish(request_rx.try_recv().unwrap());
        assert_eq!(temp.topic, "sensors/serverrack/temperature");
        assert_eq!(temp.payload.as_ref(), b"23.4");
        assert_eq!(temp.qos, QoS::AtLeastOnce);
        assert!(!temp.retain);

        let fan = expect_publish(request_rx.try_recv().unwrap());
        assert_eq!(fan.topic, "sensors/serverrack/fanspeed");
        assert_eq!(fan.payload.as_ref(), b"65");
        assert_eq!(fan.qos, QoS::AtLeastOnce);
        assert!(!fan.retain);

        assert!(request_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn nearly_full_request_queue_still_sends_both_metrics() {
        let (request_tx, request_rx) = flume::bounded(2);
        let client = AsyncClient::from_senders(request_tx);
        client
            .try_publish("sensors/other", QoS::AtMostOnce, false, "x")
            .unwrap();

        let (telemetry_tx, telemetry_rx) = mpsc::channel(TELEMETRY_QUEUE);
        let mut publisher = MqttPublisher { telemetry_tx };
        publisher.publish(&reading(23.4), DutyPercent::new(65));
        drop(publisher);

        let forwarder = tokio::spawn(forward(client, telemetry_rx));

        let mut topics = Vec::new();
        for _ in 0..3 {
            let publish = expect_publish(request_rx.recv_async().await.unwrap());
            topics.push(publish.topic);
        }
        forwarder.await.unwrap();

        assert_eq!(
            topics,
            [
                "sensors/other",
                "sensors/serverrack/temperature",
                "sensors/serverrack/fanspeed"
            ]
        );
    }
}
