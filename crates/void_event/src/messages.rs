//! Engine-owned messages that cross the plugin boundary

use glam::{UVec2, Vec3};

use void_core::Uuid;

use crate::message::MessageHeader;

/// Severity of a [`LogMessageCommand`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Matching `log` facade level; critical maps to error
    pub fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error | LogLevel::Critical => log::Level::Error,
        }
    }
}

/// Route a log line through the host's sink
#[derive(Debug)]
pub struct LogMessageCommand {
    pub header: MessageHeader,
    pub level: LogLevel,
    pub message: String,
    pub file: String,
    pub line: u32,
}

crate::command!(LogMessageCommand);

impl LogMessageCommand {
    pub fn new(level: LogLevel, message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        let mut header = MessageHeader::command();
        header.set_not_handled_behavior(crate::NotHandledBehavior::Silent);
        Self {
            header,
            level,
            message: message.into(),
            file: file.into(),
            line,
        }
    }
}

/// Ask the host to leave its main loop
#[derive(Debug)]
pub struct QuitApplicationCommand {
    pub header: MessageHeader,
}

crate::command!(QuitApplicationCommand);

impl QuitApplicationCommand {
    pub fn new() -> Self {
        Self {
            header: MessageHeader::command(),
        }
    }
}

impl Default for QuitApplicationCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Emitted after every update of a tick
#[derive(Debug)]
pub struct FrameEndEvent {
    pub header: MessageHeader,
    /// Index of the tick that just ended
    pub frame: u64,
}

crate::event!(FrameEndEvent);

impl FrameEndEvent {
    pub fn new(frame: u64) -> Self {
        Self {
            header: MessageHeader::event(),
            frame,
        }
    }
}

/// How a window occupies the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowMode {
    #[default]
    Windowed,
    Borderless,
    Fullscreen,
    Minimized,
}

/// Window parameters
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDescription {
    pub size: UVec2,
    pub mode: WindowMode,
    pub title: String,
    pub id: Uuid,
}

impl Default for WindowDescription {
    fn default() -> Self {
        Self {
            size: UVec2::new(1280, 720),
            mode: WindowMode::Windowed,
            title: String::from("Void"),
            id: Uuid::NIL,
        }
    }
}

/// Ask the windowing plugin for a window; responds with its id
#[derive(Debug)]
pub struct CreateWindowRequest {
    pub header: MessageHeader,
    pub description: WindowDescription,
    pub response: Option<Uuid>,
}

crate::request!(CreateWindowRequest => Uuid);

impl CreateWindowRequest {
    pub fn new(description: WindowDescription) -> Self {
        Self {
            header: MessageHeader::request(),
            description,
            response: None,
        }
    }
}

#[derive(Debug)]
pub struct WindowOpenedEvent {
    pub header: MessageHeader,
    pub window: WindowDescription,
}

crate::event!(WindowOpenedEvent);

impl WindowOpenedEvent {
    pub fn new(window: WindowDescription) -> Self {
        Self {
            header: MessageHeader::event(),
            window,
        }
    }
}

#[derive(Debug)]
pub struct WindowClosedEvent {
    pub header: MessageHeader,
    pub window: WindowDescription,
}

crate::event!(WindowClosedEvent);

impl WindowClosedEvent {
    pub fn new(window: WindowDescription) -> Self {
        Self {
            header: MessageHeader::event(),
            window,
        }
    }
}

#[derive(Debug)]
pub struct WindowDescriptionChangedEvent {
    pub header: MessageHeader,
    pub previous: WindowDescription,
    pub current: WindowDescription,
}

crate::event!(WindowDescriptionChangedEvent);

impl WindowDescriptionChangedEvent {
    pub fn new(previous: WindowDescription, current: WindowDescription) -> Self {
        Self {
            header: MessageHeader::event(),
            previous,
            current,
        }
    }
}

/// Ray query parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Raycast {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
}

/// Ray query answer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RaycastResult {
    pub has_hit: bool,
    pub hit_position: Vec3,
    /// Fraction of `max_distance` travelled before the hit
    pub hit_fraction: f32,
}

/// Cast a ray into the physics world
#[derive(Debug)]
pub struct RaycastRequest {
    pub header: MessageHeader,
    pub raycast: Raycast,
    pub response: Option<RaycastResult>,
}

crate::request!(RaycastRequest => RaycastResult);

impl RaycastRequest {
    pub fn new(raycast: Raycast) -> Self {
        Self {
            header: MessageHeader::request(),
            raycast,
            response: None,
        }
    }
}
