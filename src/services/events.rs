//! Event system for LMS operations
//!
//! Services emit an event after each state change. Subscribers get them over
//! a broadcast channel; the logging listener writes them to the trace log as
//! an audit trail.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Events emitted by services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LmsEvent {
    // Account events
    UserRegistered {
        id: String,
        role: String,
    },
    MentorApproved {
        id: String,
    },
    UserDeleted {
        id: String,
    },
    StudentAllocated {
        mentor_id: String,
        student_id: String,
    },

    // Authoring events
    CourseCreated {
        id: String,
        title: String,
    },
    CourseUpdated {
        id: String,
    },
    CourseDeleted {
        id: String,
    },
    ChapterAdded {
        id: String,
        course_id: String,
        sequence: i64,
    },
    CourseAssigned {
        course_id: String,
        student_id: String,
    },

    // Progress events
    ChapterCompleted {
        student_id: String,
        course_id: String,
        chapter_id: String,
    },
    CertificateIssued {
        student_id: String,
        course_id: String,
        certificate_id: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &LmsEvent);
}

/// Event bus for broadcasting LMS events
pub struct EventBus {
    sender: broadcast::Sender<LmsEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LmsEvent) {
        trace!(event = ?event, "Emitting LMS event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LmsEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LmsEvent) {
        match event {
            LmsEvent::ChapterCompleted {
                student_id,
                course_id,
                chapter_id,
            } => {
                info!(
                    student = %student_id,
                    course = %course_id,
                    chapter = %chapter_id,
                    "Chapter completed"
                );
            }
            LmsEvent::CertificateIssued {
                student_id,
                course_id,
                certificate_id,
            } => {
                info!(
                    student = %student_id,
                    course = %course_id,
                    certificate = %certificate_id,
                    "Certificate issued"
                );
            }
            LmsEvent::CourseCreated { id, title } => {
                debug!(id = %id, title = %title, "Course created");
            }
            LmsEvent::CourseAssigned {
                course_id,
                student_id,
            } => {
                debug!(course = %course_id, student = %student_id, "Course assigned");
            }
            _ => {
                trace!(event = ?event, "LMS event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
