use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::KafkaConfig;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const BACKLOG_FLUSH_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Invalid consumer configuration: {0}")]
    InvalidConfig(String),
}

/// What the consumer should do with a message once its handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done with it; its offset may be committed
    Ack,
    /// Not processed; deliver it again after the backoff
    Retry,
}

/// Processes one message payload at a time for a partition worker.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Disposition;
}

/// Per-partition controls on the underlying consumer.
pub trait PartitionControl: Send + Sync {
    /// Mark `offset` as processed so the next commit moves past it
    fn store_offset(&self, topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError>;

    /// Rewind the partition so `offset` is fetched again
    fn seek(&self, topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError>;

    /// Stop fetching the partition until `resume`
    fn pause(&self, topic: &str, partition: i32) -> Result<(), ConsumerError>;

    fn resume(&self, topic: &str, partition: i32) -> Result<(), ConsumerError>;
}

/// A message copied out of the client buffer
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

impl InboundMessage {
    fn from_message<M: Message>(message: &M) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec),
        }
    }
}

enum Handled {
    Acked,
    /// The partition was rewound to this message; wait for it to come back
    Rewound,
    Cancelled,
}

/// Sequential processor for a single partition.
///
/// Offsets are stored only for acknowledged messages. On `Retry` the worker
/// seeks back to the failed offset and drops every later message it had
/// already been handed until the failed one comes round again, so the
/// partition is never processed out of order. When the seek itself fails
/// the message is retried in place instead.
pub struct PartitionWorker {
    topic: String,
    partition: i32,
    handler: Arc<dyn MessageHandler>,
    control: Arc<dyn PartitionControl>,
    retry_backoff: Duration,
    cancel: CancellationToken,
}

impl PartitionWorker {
    pub fn new(
        topic: String,
        partition: i32,
        handler: Arc<dyn MessageHandler>,
        control: Arc<dyn PartitionControl>,
        retry_backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            topic,
            partition,
            handler,
            control,
            retry_backoff,
            cancel,
        }
    }

    pub async fn run(self, mut rx: mpsc::Receiver<InboundMessage>) {
        let mut rewind_to: Option<i64> = None;

        loop {
            let message = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(message) => message,
                    None => break,
                },
            };

            if let Some(target) = rewind_to {
                if message.offset != target {
                    debug!(
                        partition = self.partition,
                        offset = message.offset,
                        waiting_for = target,
                        "Dropping message fetched before rewind"
                    );
                    continue;
                }
                rewind_to = None;
            }

            match self.process(&message).await {
                Handled::Acked => {}
                Handled::Rewound => rewind_to = Some(message.offset),
                Handled::Cancelled => break,
            }
        }

        debug!(partition = self.partition, "Partition worker stopped");
    }

    async fn process(&self, message: &InboundMessage) -> Handled {
        let payload = message.payload.as_deref().unwrap_or_default();

        loop {
            if self.handler.handle(payload).await == Disposition::Ack {
                if let Err(e) = self
                    .control
                    .store_offset(&self.topic, self.partition, message.offset)
                {
                    // Typically the partition was revoked mid-flight; the
                    // new owner will see the message again.
                    warn!(
                        partition = self.partition,
                        offset = message.offset,
                        error = %e,
                        "Failed to store offset"
                    );
                }
                return Handled::Acked;
            }

            let rewound = match self.control.seek(&self.topic, self.partition, message.offset) {
                Ok(()) => true,
                Err(e) => {
                    error!(
                        partition = self.partition,
                        offset = message.offset,
                        error = %e,
                        "Failed to rewind partition, retrying in place"
                    );
                    false
                }
            };

            warn!(
                partition = self.partition,
                offset = message.offset,
                backoff_ms = self.retry_backoff.as_millis() as u64,
                "Message processing failed, backing off"
            );
            tokio::select! {
                () = self.cancel.cancelled() => return Handled::Cancelled,
                () = tokio::time::sleep(self.retry_backoff) => {}
            }

            if rewound {
                return Handled::Rewound;
            }
        }
    }
}

struct PartitionSlot {
    sender: mpsc::Sender<InboundMessage>,
    task: JoinHandle<()>,
    /// Messages the worker queue had no room for, oldest first
    backlog: VecDeque<InboundMessage>,
    paused: bool,
}

/// Routes messages to one [`PartitionWorker`] per partition without ever
/// waiting on a worker.
///
/// When a worker queue is full the message is parked in that partition's
/// backlog and the partition is paused on the consumer until the backlog
/// has been handed over, so a stalled partition never holds up the others.
struct PartitionDispatcher {
    topic: String,
    handler: Arc<dyn MessageHandler>,
    control: Arc<dyn PartitionControl>,
    retry_backoff: Duration,
    buffer: usize,
    cancel: CancellationToken,
    slots: HashMap<i32, PartitionSlot>,
}

impl PartitionDispatcher {
    fn new(
        topic: String,
        handler: Arc<dyn MessageHandler>,
        control: Arc<dyn PartitionControl>,
        retry_backoff: Duration,
        buffer: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            topic,
            handler,
            control,
            retry_backoff,
            buffer: buffer.max(1),
            cancel,
            slots: HashMap::new(),
        }
    }

    fn dispatch(&mut self, message: InboundMessage) {
        let partition = message.partition;
        if !self.slots.contains_key(&partition) {
            let slot = self.spawn_worker(partition);
            self.slots.insert(partition, slot);
        }
        if let Some(slot) = self.slots.get_mut(&partition) {
            slot.backlog.push_back(message);
        }
        self.drain(partition);
    }

    fn has_backlog(&self) -> bool {
        self.slots
            .values()
            .any(|slot| slot.paused || !slot.backlog.is_empty())
    }

    /// Hand parked messages to workers that have made room
    fn flush(&mut self) {
        let pending: Vec<i32> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.paused || !slot.backlog.is_empty())
            .map(|(partition, _)| *partition)
            .collect();
        for partition in pending {
            self.drain(partition);
        }
    }

    fn spawn_worker(&self, partition: i32) -> PartitionSlot {
        debug!(partition, "Starting partition worker");
        let (sender, rx) = mpsc::channel(self.buffer);
        let worker = PartitionWorker::new(
            self.topic.clone(),
            partition,
            self.handler.clone(),
            self.control.clone(),
            self.retry_backoff,
            self.cancel.child_token(),
        );
        PartitionSlot {
            sender,
            task: tokio::spawn(worker.run(rx)),
            backlog: VecDeque::new(),
            paused: false,
        }
    }

    fn drain(&mut self, partition: i32) {
        let Some(slot) = self.slots.get_mut(&partition) else {
            return;
        };

        while let Some(message) = slot.backlog.pop_front() {
            match slot.sender.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(message)) => {
                    slot.backlog.push_front(message);
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    // Only happens while shutting down; the messages stay
                    // uncommitted and are fetched again on restart.
                    debug!(partition, dropped = slot.backlog.len() + 1, "Partition worker gone");
                    slot.backlog.clear();
                    break;
                }
            }
        }

        if !slot.backlog.is_empty() && !slot.paused {
            match self.control.pause(&self.topic, partition) {
                Ok(()) => {
                    debug!(partition, backlog = slot.backlog.len(), "Paused partition");
                    slot.paused = true;
                }
                Err(e) => warn!(partition, error = %e, "Failed to pause partition"),
            }
        } else if slot.backlog.is_empty() && slot.paused {
            match self.control.resume(&self.topic, partition) {
                Ok(()) => {
                    debug!(partition, "Resumed partition");
                    slot.paused = false;
                }
                Err(e) => warn!(partition, error = %e, "Failed to resume partition"),
            }
        }
    }

    /// Close every worker queue and wait for the workers to finish
    async fn shutdown(self) {
        info!(workers = self.slots.len(), "Stopping partition workers");
        for (partition, slot) in self.slots {
            drop(slot.sender);
            if let Err(e) = slot.task.await {
                error!(partition, error = %e, "Partition worker panicked");
            }
        }
    }
}

struct KafkaPartitions {
    consumer: Arc<StreamConsumer>,
}

impl KafkaPartitions {
    fn single(topic: &str, partition: i32) -> TopicPartitionList {
        let mut list = TopicPartitionList::new();
        list.add_partition(topic, partition);
        list
    }
}

impl PartitionControl for KafkaPartitions {
    fn store_offset(&self, topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError> {
        self.consumer.store_offset(topic, partition, offset)?;
        Ok(())
    }

    fn seek(&self, topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError> {
        self.consumer
            .seek(topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)?;
        Ok(())
    }

    fn pause(&self, topic: &str, partition: i32) -> Result<(), ConsumerError> {
        self.consumer.pause(&Self::single(topic, partition))?;
        Ok(())
    }

    fn resume(&self, topic: &str, partition: i32) -> Result<(), ConsumerError> {
        self.consumer.resume(&Self::single(topic, partition))?;
        Ok(())
    }
}

/// Consumer-group member for one topic that fans messages out to one
/// [`PartitionWorker`] per partition. Partitions are processed concurrently.
pub struct EventConsumer {
    consumer: Arc<StreamConsumer>,
    topic: String,
    retry_backoff: Duration,
    partition_buffer: usize,
}
impl EventConsumer {
    /// Create a new Kafka consumer and subscribe it to the configured topic
    pub fn new(config: &KafkaConfig) -> Result<Self, ConsumerError> {
        if !config.is_enabled() {
            return Err(ConsumerError::InvalidConfig(
                "brokers, topic and group id must all be set".to_string(),
            ));
        }

        info!(
            group_id = %config.group_id,
            topic = %config.topic,
            offset_reset = %config.offset_reset,
            "Creating Kafka consumer"
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &config.group_id)
            .set("bootstrap.servers", &config.brokers)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", &config.offset_reset)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        info!("Kafka consumer created successfully");
        Ok(Self {
            consumer: Arc::new(consumer),
            topic: config.topic.clone(),
            retry_backoff: config.retry_backoff,
            partition_buffer: config.partition_buffer.max(1),
        })
    }

    /// Consume until `cancel` fires, then stop every worker, wait for them
    /// and commit the stored offsets.
    pub async fn run(self, handler: Arc<dyn MessageHandler>, cancel: CancellationToken) {
        let control: Arc<dyn PartitionControl> = Arc::new(KafkaPartitions {
            consumer: self.consumer.clone(),
        });
        let mut dispatcher = PartitionDispatcher::new(
            self.topic.clone(),
            handler,
            control,
            self.retry_backoff,
            self.partition_buffer,
            cancel.clone(),
        );
        let mut backlog_tick = tokio::time::interval(BACKLOG_FLUSH_INTERVAL);
        backlog_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(topic = %self.topic, "Starting consumption loop");

        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => break,
                _ = backlog_tick.tick(), if dispatcher.has_backlog() => {
                    dispatcher.flush();
                    continue;
                }
                result = self.consumer.recv() => result.map(|m| InboundMessage::from_message(&m)),
            };

            match received {
                Ok(message) => dispatcher.dispatch(message),
                Err(e) => {
                    warn!(error = %e, "Kafka error while consuming");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_millis(500)) => {}
                    }
                }
            }
        }

        dispatcher.shutdown().await;

        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => info!("Committed consumer offsets"),
            Err(KafkaError::ConsumerCommit(code)) => {
                debug!(?code, "Nothing to commit on shutdown")
            }
            Err(e) => warn!(error = %e, "Final offset commit failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingControl {
        fail_seeks: bool,
        stored: Mutex<Vec<(i32, i64)>>,
        seeks: Mutex<Vec<(i32, i64)>>,
        paused: Mutex<Vec<i32>>,
        resumed: Mutex<Vec<i32>>,
    }

    impl RecordingControl {
        fn stored_on(&self, partition: i32) -> Vec<i64> {
            let stored = self.stored.lock().unwrap();
            stored
                .iter()
                .filter(|(p, _)| *p == partition)
                .map(|(_, offset)| *offset)
                .collect()
        }

        fn seeks_on(&self, partition: i32) -> Vec<i64> {
            let seeks = self.seeks.lock().unwrap();
            seeks
                .iter()
                .filter(|(p, _)| *p == partition)
                .map(|(_, offset)| *offset)
                .collect()
        }
    }

    impl PartitionControl for RecordingControl {
        fn store_offset(&self, _topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError> {
            self.stored.lock().unwrap().push((partition, offset));
            Ok(())
        }

        fn seek(&self, _topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError> {
            self.seeks.lock().unwrap().push((partition, offset));
            if self.fail_seeks {
                return Err(ConsumerError::Kafka(KafkaError::Seek(
                    "broker unavailable".to_string(),
                )));
            }
            Ok(())
        }

        fn pause(&self, _topic: &str, partition: i32) -> Result<(), ConsumerError> {
            self.paused.lock().unwrap().push(partition);
            Ok(())
        }

        fn resume(&self, _topic: &str, partition: i32) -> Result<(), ConsumerError> {
            self.resumed.lock().unwrap().push(partition);
            Ok(())
        }
    }

    /// Retries the first attempt of any payload listed in `fail_once`.
    #[derive(Default)]
    struct ScriptedHandler {
        fail_once: Mutex<Vec<String>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedHandler {
        fn failing_once(payloads: &[&str]) -> Self {
            Self {
                fail_once: Mutex::new(payloads.iter().map(|p| p.to_string()).collect()),
                ..Default::default()
            }
        }

        fn saw(&self, payload: &str) -> bool {
            self.seen.lock().unwrap().iter().any(|p| p == payload)
        }
    }

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        async fn handle(&self, payload: &[u8]) -> Disposition {
            let text = String::from_utf8_lossy(payload).to_string();
            self.seen.lock().unwrap().push(text.clone());

            let mut fail_once = self.fail_once.lock().unwrap();
            if let Some(pos) = fail_once.iter().position(|p| *p == text) {
                fail_once.remove(pos);
                return Disposition::Retry;
            }
            Disposition::Ack
        }
    }

    fn message_on(partition: i32, offset: i64) -> InboundMessage {
        InboundMessage {
            topic: "orders".to_string(),
            partition,
            offset,
            key: None,
            payload: Some(format!("{}/{}", partition, offset).into_bytes()),
        }
    }

    fn message(offset: i64) -> InboundMessage {
        message_on(0, offset)
    }

    fn worker(
        handler: Arc<ScriptedHandler>,
        control: Arc<RecordingControl>,
        cancel: CancellationToken,
    ) -> PartitionWorker {
        PartitionWorker::new(
            "orders".to_string(),
            0,
            handler,
            control,
            Duration::from_millis(200),
            cancel,
        )
    }

    async fn run_worker(
        handler: Arc<ScriptedHandler>,
        control: Arc<RecordingControl>,
        offsets: &[i64],
    ) {
        let (tx, rx) = mpsc::channel(offsets.len().max(1));
        let task = tokio::spawn(worker(handler, control, CancellationToken::new()).run(rx));
        for offset in offsets {
            tx.send(message(*offset)).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();
    }

    /// Flush the dispatcher the way the consume loop does until `done` holds
    async fn drive_until(dispatcher: &mut PartitionDispatcher, done: impl Fn() -> bool) {
        for _ in 0..200 {
            dispatcher.flush();
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("dispatcher did not reach the expected state");
    }

    #[tokio::test]
    async fn acked_messages_store_offsets_in_order() {
        let handler = Arc::new(ScriptedHandler::default());
        let control = Arc::new(RecordingControl::default());

        run_worker(handler, control.clone(), &[0, 1, 2]).await;

        assert_eq!(control.stored_on(0), vec![0, 1, 2]);
        assert!(control.seeks_on(0).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_rewinds_and_skips_prefetched_messages() {
        let handler = Arc::new(ScriptedHandler::failing_once(&["0/5"]));
        let control = Arc::new(RecordingControl::default());

        // Prefetched batch, then the batch the broker redelivers after the seek.
        run_worker(handler.clone(), control.clone(), &[5, 6, 7, 5, 6, 7]).await;

        assert_eq!(control.seeks_on(0), vec![5]);
        assert_eq!(control.stored_on(0), vec![5, 6, 7]);
        assert_eq!(*handler.seen.lock().unwrap(), vec!["0/5", "0/5", "0/6", "0/7"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_rewind_retries_in_place_and_keeps_the_partition_moving() {
        let handler = Arc::new(ScriptedHandler::failing_once(&["0/5"]));
        let control = Arc::new(RecordingControl {
            fail_seeks: true,
            ..Default::default()
        });

        // The seek failed, so nothing is redelivered: 6 and 7 follow directly.
        run_worker(handler.clone(), control.clone(), &[5, 6, 7]).await;

        assert_eq!(control.seeks_on(0), vec![5]);
        assert_eq!(control.stored_on(0), vec![5, 6, 7]);
        assert_eq!(*handler.seen.lock().unwrap(), vec!["0/5", "0/5", "0/6", "0/7"]);
    }

    #[tokio::test]
    async fn missing_payload_is_handled_as_empty() {
        let handler = Arc::new(ScriptedHandler::default());
        let control = Arc::new(RecordingControl::default());
        let (tx, rx) = mpsc::channel(1);

        let task = tokio::spawn(
            worker(handler.clone(), control.clone(), CancellationToken::new()).run(rx),
        );
        let mut tombstone = message(9);
        tombstone.payload = None;
        tx.send(tombstone).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(*handler.seen.lock().unwrap(), vec![String::new()]);
        assert_eq!(control.stored_on(0), vec![9]);
    }

    #[tokio::test]
    async fn worker_stops_on_cancellation() {
        let handler = Arc::new(ScriptedHandler::default());
        let control = Arc::new(RecordingControl::default());
        let cancel = CancellationToken::new();
        let (_tx, rx) = mpsc::channel(1);

        let task = tokio::spawn(worker(handler, control, cancel.clone()).run(rx));
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(100), task).await;
        assert!(result.is_ok(), "worker should stop on cancellation");
    }

    #[tokio::test]
    async fn cancellation_interrupts_retry_backoff() {
        let handler = Arc::new(ScriptedHandler::failing_once(&["0/1"]));
        let control = Arc::new(RecordingControl::default());
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);

        let worker = PartitionWorker::new(
            "orders".to_string(),
            0,
            handler,
            control.clone(),
            Duration::from_secs(3600),
            cancel.clone(),
        );
        let task = tokio::spawn(worker.run(rx));
        tx.send(message(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(200), task).await;
        assert!(result.is_ok(), "backoff should not outlive cancellation");
        assert!(control.stored_on(0).is_empty());
    }

    #[tokio::test]
    async fn stalled_partition_does_not_hold_up_others() {
        let handler = Arc::new(ScriptedHandler::failing_once(&["0/1"]));
        let control = Arc::new(RecordingControl::default());
        let cancel = CancellationToken::new();
        let mut dispatcher = PartitionDispatcher::new(
            "orders".to_string(),
            handler.clone(),
            control.clone(),
            Duration::from_secs(3600),
            1,
            cancel.clone(),
        );

        dispatcher.dispatch(message_on(0, 1));
        drive_until(&mut dispatcher, || handler.saw("0/1")).await;

        // Partition 0 sits in its backoff; its queue fills and the rest is parked.
        for offset in 2..=4 {
            dispatcher.dispatch(message_on(0, offset));
        }
        dispatcher.dispatch(message_on(1, 0));
        dispatcher.dispatch(message_on(1, 1));

        drive_until(&mut dispatcher, || control.stored_on(1) == vec![0, 1]).await;

        assert!(control.paused.lock().unwrap().contains(&0));
        assert!(!control.resumed.lock().unwrap().contains(&0));
        assert!(control.stored_on(0).is_empty());
        assert!(!handler.saw("0/2"));
        assert!(dispatcher.has_backlog());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), dispatcher.shutdown())
            .await
            .expect("workers should stop on cancellation");
    }

    #[tokio::test]
    async fn parked_messages_are_delivered_in_order_and_partition_resumed() {
        let handler = Arc::new(ScriptedHandler::failing_once(&["0/1"]));
        let control = Arc::new(RecordingControl::default());
        let cancel = CancellationToken::new();
        let mut dispatcher = PartitionDispatcher::new(
            "orders".to_string(),
            handler.clone(),
            control.clone(),
            Duration::from_millis(50),
            1,
            cancel.clone(),
        );

        dispatcher.dispatch(message_on(0, 1));
        drive_until(&mut dispatcher, || handler.saw("0/1")).await;

        // Redelivery after the rewind arrives while the worker backs off.
        for offset in 1..=3 {
            dispatcher.dispatch(message_on(0, offset));
        }
        assert_eq!(*control.paused.lock().unwrap(), vec![0]);

        drive_until(&mut dispatcher, || control.stored_on(0) == vec![1, 2, 3]).await;

        assert_eq!(control.seeks_on(0), vec![1]);
        assert_eq!(*control.resumed.lock().unwrap(), vec![0]);
        assert!(!dispatcher.has_backlog());
        assert_eq!(*handler.seen.lock().unwrap(), vec!["0/1", "0/1", "0/2", "0/3"]);

        cancel.cancel();
        dispatcher.shutdown().await;
    }

    #[test]
    fn consumer_rejects_disabled_config() {
        let config = KafkaConfig {
            topic: String::new(),
            ..KafkaConfig::default()
        };
        assert!(matches!(
            EventConsumer::new(&config),
            Err(ConsumerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn consumer_creation_does_not_need_a_broker() {
        // Connection happens on the first poll.
        let config = KafkaConfig {
            brokers: "invalid:9092".to_string(),
            ..KafkaConfig::default()
        };
        assert!(EventConsumer::new(&config).is_ok());
    }
}
