use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::renderer::scale_to_window;

pub const WINDOW_SIZE: [u32; 2] = [600, 450];
pub const TICKS_PER_SECOND: u32 = 10;

/// Drawing surface the viewer renders into.
///
/// Operations are staged until `present` makes them visible.
pub trait Screen {
    fn size(&self) -> [u32; 2];
    fn clear(&mut self);
    fn blit(&mut self, bitmap: &RgbaImage);
    fn draw_label(&mut self, text: &str);
    fn present(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move toward the first loaded (most recent) image.
    ShiftNewer,
    /// Move toward the last loaded (oldest) image.
    ShiftOlder,
    /// Show the next older image, fetching it first when none is loaded.
    LoadOlderOrShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEvent {
    Close,
    KeyPressed(Key),
}

/// Frame-rate limiter. `tick` sleeps out the rest of the current tick.
#[derive(Debug)]
pub struct Clock {
    interval: Option<Duration>,
    last_tick: Option<Instant>,
}

impl Clock {
    pub fn new(ticks_per_second: u32) -> Self {
        let interval = (ticks_per_second > 0).then(|| Duration::from_secs(1) / ticks_per_second);
        Self {
            interval,
            last_tick: None,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            interval: None,
            last_tick: None,
        }
    }

    /// Returns the time since the previous tick, including any sleep.
    pub fn tick(&mut self) -> Duration {
        if let (Some(interval), Some(last_tick)) = (self.interval, self.last_tick) {
            let elapsed = last_tick.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }

        let now = Instant::now();
        let since_last = self
            .last_tick
            .map(|last_tick| now.duration_since(last_tick))
            .unwrap_or_default();
        self.last_tick = Some(now);
        since_last
    }
}

pub struct ImageViewer<S: Screen> {
    screen: S,
    clock: Clock,
    running: bool,
    render_new: bool,
    images: Vec<RgbaImage>,
    current_image: Option<usize>,
    key_map: HashMap<Key, Action>,
}

impl<S: Screen> ImageViewer<S> {
    pub fn new(screen: S, clock: Clock) -> Self {
        let mut viewer = Self {
            screen,
            clock,
            running: true,
            render_new: true,
            images: Vec::new(),
            current_image: None,
            key_map: HashMap::new(),
        };
        // Right walks toward today, left further into the past.
        viewer.bind(Key::Right, Action::ShiftNewer);
        viewer.bind(Key::Left, Action::ShiftOlder);
        viewer
    }

    pub fn bind(&mut self, key: Key, action: Action) {
        self.key_map.insert(key, action);
    }

    pub fn binding(&self, key: Key) -> Option<Action> {
        self.key_map.get(&key).copied()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(test)]
    pub fn images(&self) -> &[RgbaImage] {
        &self.images
    }

    #[cfg(test)]
    pub fn current_image(&self) -> Option<usize> {
        self.current_image
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    pub fn cursor_at_newest(&self) -> bool {
        self.current_image.is_some() && self.current_image == self.images.len().checked_sub(1)
    }

    pub fn shift_cursor_by(&mut self, delta: isize) {
        let Some(current) = self.current_image else {
            return;
        };
        let last = self.images.len().saturating_sub(1);
        let shifted = if delta.is_negative() {
            current.saturating_sub(delta.unsigned_abs())
        } else {
            current.saturating_add(delta.unsigned_abs())
        };
        self.current_image = Some(shifted.min(last));
        self.render_new = true;
    }

    /// Points the cursor back at the first loaded image, if there is one.
    pub fn reset_cursor(&mut self) {
        if !self.images.is_empty() {
            self.current_image = Some(0);
            self.render_new = true;
        }
    }

    pub fn append_bitmap(&mut self, bitmap: RgbaImage) {
        self.images.push(bitmap);
        self.render_new = true;
        self.current_image = Some(match self.current_image {
            None => 0,
            Some(current) => current + 1,
        });
    }

    pub fn scale(&self, bitmap: &RgbaImage) -> RgbaImage {
        scale_to_window(bitmap, self.screen.size())
    }

    /// Ticks the frame clock and turns raw events into bound actions.
    pub fn poll_events(&mut self, events: &[ViewerEvent]) -> Vec<Action> {
        self.clock.tick();

        let mut actions = Vec::new();
        for event in events {
            match *event {
                ViewerEvent::Close => self.running = false,
                ViewerEvent::KeyPressed(key) => {
                    if let Some(action) = self.binding(key) {
                        actions.push(action);
                    }
                }
            }
        }
        actions
    }

    pub fn perform(&mut self, action: Action) {
        match action {
            Action::ShiftNewer => self.shift_cursor_by(-1),
            Action::ShiftOlder | Action::LoadOlderOrShift => self.shift_cursor_by(1),
        }
    }

    /// Draws the selected image if something changed. Returns whether a
    /// frame was presented.
    pub fn redraw_if_needed(&mut self) -> bool {
        if !self.render_new {
            return false;
        }
        self.render_new = false;

        let Some(bitmap) = self.current_image.and_then(|index| self.images.get(index)) else {
            return false;
        };
        self.screen.clear();
        self.screen.blit(bitmap);
        self.screen.present();
        true
    }

    /// Draws `text` over whatever is on screen and presents it at once.
    pub fn show_status(&mut self, text: &str) {
        self.screen.draw_label(text);
        self.screen.present();
    }

    pub fn clear_screen(&mut self) {
        self.screen.clear();
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingScreen {
    pub presents: usize,
    pub blitted: Option<(u32, u32)>,
    pub label: Option<String>,
    pub shown_label: Option<String>,
}

#[cfg(test)]
impl Screen for RecordingScreen {
    fn size(&self) -> [u32; 2] {
        WINDOW_SIZE
    }

    fn clear(&mut self) {
        self.blitted = None;
        self.label = None;
    }

    fn blit(&mut self, bitmap: &RgbaImage) {
        self.blitted = Some(bitmap.dimensions());
    }

    fn draw_label(&mut self, text: &str) {
        self.label = Some(text.to_string());
    }

    fn present(&mut self) {
        self.presents += 1;
        self.shown_label = self.label.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> ImageViewer<RecordingScreen> {
        ImageViewer::new(RecordingScreen::default(), Clock::unlimited())
    }

    fn bitmap(width: u32, height: u32) -> RgbaImage {
        RgbaImage::new(width, height)
    }

    #[test]
    fn starts_empty_and_dirty() {
        let viewer = viewer();
        assert!(viewer.is_running());
        assert!(viewer.images().is_empty());
        assert_eq!(viewer.current_image(), None);
        assert!(!viewer.cursor_at_newest());
    }

    #[test]
    fn shifting_an_empty_viewer_keeps_cursor_unset() {
        let mut viewer = viewer();
        for delta in [-3, -1, 0, 1, 5] {
            viewer.shift_cursor_by(delta);
            assert_eq!(viewer.current_image(), None);
        }
    }

    #[test]
    fn cursor_stays_in_bounds_for_any_shift_sequence() {
        let mut viewer = viewer();
        for width in 1..=4 {
            viewer.append_bitmap(bitmap(width, 1));
        }

        for delta in [-10, 3, 1, 1, -2, 7, -1, 0, -4, 2, isize::MAX, isize::MIN] {
            viewer.shift_cursor_by(delta);
            let current = viewer.current_image().expect("cursor should be set");
            assert!(current < viewer.images().len());
        }
    }

    #[test]
    fn shifting_clamps_at_both_ends() {
        let mut viewer = viewer();
        viewer.append_bitmap(bitmap(1, 1));
        viewer.append_bitmap(bitmap(2, 1));
        viewer.append_bitmap(bitmap(3, 1));

        viewer.shift_cursor_by(5);
        assert_eq!(viewer.current_image(), Some(2));
        viewer.shift_cursor_by(-1);
        assert_eq!(viewer.current_image(), Some(1));
        viewer.shift_cursor_by(-5);
        assert_eq!(viewer.current_image(), Some(0));
    }

    #[test]
    fn clamped_shift_still_marks_render_pending() {
        let mut viewer = viewer();
        viewer.append_bitmap(bitmap(1, 1));
        assert!(viewer.redraw_if_needed());

        viewer.shift_cursor_by(-1);
        assert_eq!(viewer.current_image(), Some(0));
        assert!(viewer.redraw_if_needed());
    }

    #[test]
    fn append_keeps_order_and_selects_newest() {
        let mut viewer = viewer();
        for width in 1..=5 {
            viewer.append_bitmap(bitmap(width, 1));
            assert_eq!(viewer.current_image(), Some(width as usize - 1));
            assert!(viewer.cursor_at_newest());
        }

        let widths = viewer
            .images()
            .iter()
            .map(|image| image.width())
            .collect::<Vec<_>>();
        assert_eq!(widths, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn append_after_shifting_back_advances_cursor_by_one() {
        let mut viewer = viewer();
        viewer.append_bitmap(bitmap(1, 1));
        viewer.append_bitmap(bitmap(2, 1));
        viewer.shift_cursor_by(-1);

        viewer.append_bitmap(bitmap(3, 1));
        assert_eq!(viewer.current_image(), Some(1));
        assert_eq!(viewer.images().len(), 3);
    }

    #[test]
    fn scale_uses_screen_size() {
        let viewer = viewer();
        assert_eq!(viewer.scale(&bitmap(1200, 800)).dimensions(), (600, 400));
        assert_eq!(viewer.scale(&bitmap(800, 1200)).dimensions(), (300, 450));
    }

    #[test]
    fn redraw_presents_once_per_change() {
        let mut viewer = viewer();
        viewer.append_bitmap(bitmap(600, 300));

        assert!(viewer.redraw_if_needed());
        assert!(!viewer.redraw_if_needed());
        assert_eq!(viewer.screen().presents, 1);
        assert_eq!(viewer.screen().blitted, Some((600, 300)));
    }

    #[test]
    fn redraw_with_empty_sequence_keeps_status_text() {
        let mut viewer = viewer();
        viewer.show_status("Error...");
        assert!(!viewer.redraw_if_needed());
        assert_eq!(viewer.screen().presents, 1);
        assert_eq!(viewer.screen().shown_label.as_deref(), Some("Error..."));
    }

    #[test]
    fn redraw_clears_previous_status() {
        let mut viewer = viewer();
        viewer.show_status("Loading...");
        viewer.append_bitmap(bitmap(10, 10));
        assert!(viewer.redraw_if_needed());
        assert_eq!(viewer.screen().shown_label, None);
    }

    #[test]
    fn default_bindings_page_in_both_directions() {
        let mut viewer = viewer();
        for width in 1..=3 {
            viewer.append_bitmap(bitmap(width, 1));
        }

        let actions = viewer.poll_events(&[ViewerEvent::KeyPressed(Key::Right)]);
        assert_eq!(actions, vec![Action::ShiftNewer]);
        for action in actions {
            viewer.perform(action);
        }
        assert_eq!(viewer.current_image(), Some(1));

        let actions = viewer.poll_events(&[ViewerEvent::KeyPressed(Key::Left)]);
        assert_eq!(actions, vec![Action::ShiftOlder]);
    }

    #[test]
    fn rebinding_replaces_previous_action() {
        let mut viewer = viewer();
        viewer.bind(Key::Left, Action::LoadOlderOrShift);
        assert_eq!(viewer.binding(Key::Left), Some(Action::LoadOlderOrShift));
        assert_eq!(viewer.binding(Key::Right), Some(Action::ShiftNewer));
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let mut viewer = viewer();
        let actions = viewer.poll_events(&[
            ViewerEvent::KeyPressed(Key::Up),
            ViewerEvent::KeyPressed(Key::Down),
        ]);
        assert!(actions.is_empty());
        assert!(viewer.is_running());
    }

    #[test]
    fn close_event_stops_the_loop() {
        let mut viewer = viewer();
        let actions = viewer.poll_events(&[
            ViewerEvent::KeyPressed(Key::Left),
            ViewerEvent::Close,
        ]);
        assert_eq!(actions, vec![Action::ShiftOlder]);
        assert!(!viewer.is_running());
    }

    #[test]
    fn clock_waits_out_the_tick() {
        let mut clock = Clock::new(50);
        clock.tick();
        let elapsed = clock.tick();
        assert!(elapsed >= Duration::from_millis(20));
    }
}
