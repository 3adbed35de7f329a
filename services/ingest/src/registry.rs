//! Sensor Registry
//!
//! Process-wide table from sensor id to the inbound queue of that sensor's worker.
//!
//! All three operations take one lock for the duration of a single map operation. The
//! lock is never held across a queue send, an RPC or a log write: callers get a cloned
//! [`PacketSender`] back and `try_send` on it after the guard is gone.
//!
//! Removing an entry only detaches the mapping. Whether the worker then stops depends
//! on whether anyone else still holds a sender for its queue.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use types::{Packet, SensorId};

/// Producer half of a sensor queue
pub type PacketSender = mpsc::Sender<Packet>;

/// Consumer half of a sensor queue, owned by the worker
pub type PacketReceiver = mpsc::Receiver<Packet>;

/// Outcome of [`SensorRegistry::register_if_absent`]
#[derive(Debug)]
pub enum Registration {
    /// No entry existed; a queue was created and the caller must start its worker
    Created {
        queue: PacketSender,
        inbox: PacketReceiver,
    },
    /// The sensor was already registered
    Existing { queue: PacketSender },
}

impl Registration {
    pub fn created(&self) -> bool {
        matches!(self, Registration::Created { .. })
    }

    pub fn queue(&self) -> &PacketSender {
        match self {
            Registration::Created { queue, .. } | Registration::Existing { queue } => queue,
        }
    }
}

/// Registry of live sensor queues
#[derive(Debug)]
pub struct SensorRegistry {
    streams: Mutex<HashMap<SensorId, PacketSender>>,
    queue_capacity: usize,
}

impl SensorRegistry {
    /// Registry whose queues hold at most `queue_capacity` packets
    ///
    /// A capacity of zero is raised to one; tokio channels cannot be unbuffered.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Create a queue for `sensor` unless one is already registered
    pub fn register_if_absent(&self, sensor: SensorId) -> Registration {
        let mut streams = self.streams.lock();
        if let Some(queue) = streams.get(&sensor) {
            return Registration::Existing {
                queue: queue.clone(),
            };
        }

        let (queue, inbox) = mpsc::channel(self.queue_capacity);
        streams.insert(sensor, queue.clone());
        Registration::Created { queue, inbox }
    }

    pub fn lookup(&self, sensor: SensorId) -> Option<PacketSender> {
        self.streams.lock().get(&sensor).cloned()
    }

    /// Detach `sensor`, returning the sender the registry held
    pub fn unregister(&self, sensor: SensorId) -> Option<PacketSender> {
        self.streams.lock().remove(&sensor)
    }

    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }

    /// Registered sensor ids in ascending order
    pub fn sensors(&self) -> Vec<SensorId> {
        let mut sensors: Vec<SensorId> = self.streams.lock().keys().copied().collect();
        sensors.sort_unstable();
        sensors
    }
}
