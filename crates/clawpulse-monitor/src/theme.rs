use clawpulse_core::{ConnectionState, LockState, MemoryPressure, Severity};
use ratatui::style::{Color, Modifier, Style};

pub const BG: Color = Color::Rgb(15, 23, 42);
pub const SURFACE: Color = Color::Rgb(30, 41, 59);
pub const BORDER: Color = Color::Rgb(51, 65, 85);
pub const TITLE: Color = Color::Rgb(226, 232, 240);
pub const TEXT: Color = Color::Rgb(203, 213, 225);
pub const MUTED: Color = Color::Rgb(148, 163, 184);
pub const OK: Color = Color::Rgb(74, 222, 128);
pub const WARN: Color = Color::Rgb(250, 204, 21);
pub const CRITICAL: Color = Color::Rgb(248, 113, 113);

pub const CPU_SERIES: Color = Color::Rgb(20, 184, 166);
pub const MEMORY_SERIES: Color = Color::Rgb(139, 92, 246);
pub const TOKEN_SERIES: Color = Color::Rgb(251, 191, 36);

pub const TITLE_STYLE: Style = Style::new().fg(TITLE).add_modifier(Modifier::BOLD);

pub fn connection_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connected => OK,
        ConnectionState::Disconnected | ConnectionState::Error => CRITICAL,
        ConnectionState::Connecting => WARN,
    }
}

pub fn connection_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Error => "error",
        ConnectionState::Connecting => "connecting...",
    }
}

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => OK,
        Severity::Warning => WARN,
        Severity::Error => CRITICAL,
        Severity::Info => MUTED,
    }
}

pub fn pressure_color(pressure: MemoryPressure) -> Color {
    match pressure {
        MemoryPressure::Critical => CRITICAL,
        MemoryPressure::Elevated => WARN,
        MemoryPressure::Normal => CPU_SERIES,
    }
}

pub fn lock_color(state: LockState) -> Color {
    match state {
        LockState::Locked => CRITICAL,
        LockState::Released => OK,
    }
}
