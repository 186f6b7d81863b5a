//! 128x64 monochrome display, simulated as a draw-op log
//!
//! States draw into a pending frame and call `render()` to commit it. The
//! harness reads the committed frame back for assertions; nothing here
//! rasterizes pixels.

use std::fmt;

pub const SCREEN_WIDTH: i32 = 128;
pub const SCREEN_HEIGHT: i32 = 64;

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text { x: i32, y: i32, text: String },
    FilledBox { x: i32, y: i32, w: i32, h: i32 },
    Frame { x: i32, y: i32, w: i32, h: i32 },
}

impl fmt::Display for DrawOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawOp::Text { x, y, text } => write!(f, "text({x},{y},\"{text}\")"),
            DrawOp::FilledBox { x, y, w, h } => write!(f, "box({x},{y},{w},{h})"),
            DrawOp::Frame { x, y, w, h } => write!(f, "frame({x},{y},{w},{h})"),
        }
    }
}

#[derive(Default)]
pub struct DisplayDriver {
    pending: Vec<DrawOp>,
    committed: Vec<DrawOp>,
    frames_rendered: u64,
}

impl DisplayDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh frame
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn draw_text(&mut self, x: i32, y: i32, text: impl Into<String>) {
        self.pending.push(DrawOp::Text {
            x,
            y,
            text: text.into(),
        });
    }

    /// Horizontally centered text
    pub fn draw_centered_text(&mut self, y: i32, text: impl Into<String>) {
        let text = text.into();
        // 6px glyph advance
        let x = (SCREEN_WIDTH - text.len() as i32 * 6) / 2;
        self.pending.push(DrawOp::Text {
            x: x.max(0),
            y,
            text,
        });
    }

    pub fn draw_filled_box(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.pending.push(DrawOp::FilledBox { x, y, w, h });
    }

    pub fn draw_frame(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.pending.push(DrawOp::Frame { x, y, w, h });
    }

    /// Commit the pending frame
    pub fn render(&mut self) {
        self.committed = std::mem::take(&mut self.pending);
        self.frames_rendered += 1;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// All text on the committed frame, in draw order, newline-joined
    pub fn screen_text(&self) -> String {
        self.committed
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn committed_ops(&self) -> &[DrawOp] {
        &self.committed
    }
}
