//! The "Thinking" animation shown while a request is in flight.
//!
//! The animation runs on its own thread and shares nothing with the caller
//! except a stop flag.  [`ProgressIndicator::stop`] sets the flag and joins
//! the thread, so once it returns the line has been cleared and nothing else
//! will be written.  Dropping an indicator stops it the same way.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::observability::{INDICATOR_STARTS, INDICATOR_STOPS};

/// Time between redraws.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(80);

/// Number of character cells the marker row spans.
pub const SLOTS: usize = 15;

const MARKER: &str = "●";
const LABEL_COLOR: &str = "\x1b[1;32m";
const ANSI_RESET: &str = "\x1b[0m";
const MARKER_COLORS: [&str; 6] = [
    "\x1b[1;31m", // red
    "\x1b[1;33m", // yellow
    "\x1b[1;32m", // green
    "\x1b[1;36m", // cyan
    "\x1b[1;34m", // blue
    "\x1b[1;35m", // magenta
];
/// Columns blanked when the indicator stops.
pub(crate) const CLEAR_WIDTH: usize = 80;

/// Produces the successive frames of the animation.
///
/// Markers sit on every other slot.  Their number grows until the row is
/// full, then shrinks back to zero; the color palette rotates by one at each
/// end so the pattern appears to travel.
#[derive(Debug, Clone)]
pub struct Frames {
    visible: usize,
    growing: bool,
    color_offset: usize,
    use_color: bool,
}

impl Frames {
    /// Creates the frame sequence, starting from an empty row.
    pub fn new(use_color: bool) -> Self {
        Self {
            visible: 0,
            growing: true,
            color_offset: 0,
            use_color,
        }
    }

    /// Number of markers in the next frame.
    pub fn visible(&self) -> usize {
        self.visible
    }

    fn render(&self) -> String {
        let mut row = vec![" ".to_string(); SLOTS];
        for i in 0..self.visible {
            row[i * 2] = if self.use_color {
                let color = MARKER_COLORS[(self.color_offset + i) % MARKER_COLORS.len()];
                format!("{color}{MARKER}{ANSI_RESET}")
            } else {
                MARKER.to_string()
            };
        }
        let label = if self.use_color {
            format!("{LABEL_COLOR}Thinking{ANSI_RESET}")
        } else {
            "Thinking".to_string()
        };
        format!("{label} {}", row.concat())
    }

    fn advance(&mut self) {
        if self.growing {
            self.visible += 1;
            if self.visible * 2 >= SLOTS {
                self.growing = false;
                self.color_offset += 1;
            }
        } else {
            self.visible -= 1;
            if self.visible == 0 {
                self.growing = true;
                self.color_offset += 1;
            }
        }
    }
}

impl Iterator for Frames {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let frame = self.render();
        self.advance();
        Some(frame)
    }
}

/// A running animation.  Stop it with [`ProgressIndicator::stop`] or by
/// dropping it.
#[derive(Debug)]
pub struct ProgressIndicator {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressIndicator {
    /// Starts animating on `out`.
    pub fn start<W>(out: W, use_color: bool) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::start_with_interval(out, use_color, FRAME_INTERVAL)
    }

    /// Starts animating on `out`, redrawing every `interval`.
    pub fn start_with_interval<W>(mut out: W, use_color: bool, interval: Duration) -> Self
    where
        W: Write + Send + 'static,
    {
        INDICATOR_STARTS.click();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let mut frames = Frames::new(use_color);
            while !flag.load(Ordering::Acquire) {
                if let Some(frame) = frames.next() {
                    let _ = write!(out, "{frame}\r");
                    let _ = out.flush();
                }
                thread::sleep(interval);
            }
            let _ = write!(out, "{}\r", " ".repeat(CLEAR_WIDTH));
            let _ = out.flush();
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the animation, clears its line, and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.store(true, Ordering::Release);
            let _ = handle.join();
            INDICATOR_STOPS.click();
        }
    }
}

impl Drop for ProgressIndicator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
