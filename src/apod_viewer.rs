use std::collections::VecDeque;
use std::mem;

use chrono::NaiveDate;
use image::RgbaImage;

use crate::apod::{format_date, ApodSource, FetchError};
use crate::viewer::{Action, Clock, ImageViewer, Key, Screen, ViewerEvent};

pub const LOADING_LABEL: &str = "Loading...";
pub const ERROR_LABEL: &str = "Error...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerSettings {
    pub hd: bool,
    pub preload: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingFetch {
    AwaitFirstFrame { preload: usize },
    Initial { preload: usize },
    Older,
}

/// Picture-of-the-day browser. Paging left past the oldest loaded picture
/// fetches the day before it; paging right walks back toward today.
pub struct ApodViewer<S: Screen, F: ApodSource> {
    viewer: ImageViewer<S>,
    source: F,
    current_date: NaiveDate,
    hd: bool,
    pending_fetch: Option<PendingFetch>,
    deferred_actions: VecDeque<Action>,
}

impl<S: Screen, F: ApodSource> ApodViewer<S, F> {
    /// The first `tick` only leaves the loading text on screen; the initial
    /// load and preload run on the second, once that frame has been painted.
    pub fn new(
        screen: S,
        source: F,
        today: NaiveDate,
        clock: Clock,
        settings: ViewerSettings,
    ) -> Self {
        let mut viewer = ImageViewer::new(screen, clock);
        viewer.bind(Key::Right, Action::ShiftNewer);
        viewer.bind(Key::Left, Action::LoadOlderOrShift);
        viewer.show_status(LOADING_LABEL);

        Self {
            viewer,
            source,
            current_date: today,
            hd: settings.hd,
            pending_fetch: Some(PendingFetch::AwaitFirstFrame {
                preload: settings.preload,
            }),
            deferred_actions: VecDeque::new(),
        }
    }

    pub fn viewer(&self) -> &ImageViewer<S> {
        &self.viewer
    }

    #[cfg(test)]
    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn is_running(&self) -> bool {
        self.viewer.is_running()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_fetch.is_some()
    }

    /// Runs one iteration of the browse loop.
    ///
    /// A fetch scheduled by the previous tick blocks here first. Actions that
    /// arrive behind a newly scheduled fetch wait for the next tick.
    pub fn tick(&mut self, events: &[ViewerEvent]) -> Result<(), FetchError> {
        self.run_pending_fetch()?;

        let mut actions = mem::take(&mut self.deferred_actions);
        actions.extend(self.viewer.poll_events(events));
        while let Some(action) = actions.pop_front() {
            if self.pending_fetch.is_some() {
                self.deferred_actions.push_back(action);
            } else {
                self.dispatch(action);
            }
        }

        if self.pending_fetch.is_none() {
            self.viewer.redraw_if_needed();
        }
        Ok(())
    }

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::LoadOlderOrShift if self.viewer.cursor_at_newest() => {
                self.viewer.show_status(LOADING_LABEL);
                self.pending_fetch = Some(PendingFetch::Older);
            }
            Action::LoadOlderOrShift => self.viewer.shift_cursor_by(1),
            other => self.viewer.perform(other),
        }
    }

    fn run_pending_fetch(&mut self) -> Result<(), FetchError> {
        match self.pending_fetch.take() {
            None => Ok(()),
            Some(PendingFetch::AwaitFirstFrame { preload }) => {
                self.pending_fetch = Some(PendingFetch::Initial { preload });
                Ok(())
            }
            Some(PendingFetch::Initial { preload }) => {
                self.load_initial();
                self.preload(preload)
            }
            Some(PendingFetch::Older) => self.load_older_or_shift(),
        }
    }

    pub fn fetch_for_current_date(&mut self) -> Result<RgbaImage, FetchError> {
        log::info!("Fetching APOD for {}", format_date(self.current_date));
        self.source.fetch(self.current_date, self.hd)
    }

    /// Shows today's picture, or an error label if it cannot be fetched.
    pub fn load_initial(&mut self) {
        match self.fetch_for_current_date() {
            Ok(bitmap) => self.append_scaled(&bitmap),
            Err(err) => {
                log::warn!(
                    "Could not load APOD for {}: {err}",
                    format_date(self.current_date)
                );
                self.viewer.clear_screen();
                self.viewer.show_status(ERROR_LABEL);
            }
        }
    }

    pub fn load_older_or_shift(&mut self) -> Result<(), FetchError> {
        if !self.viewer.cursor_at_newest() {
            self.viewer.shift_cursor_by(1);
            return Ok(());
        }

        self.viewer.show_status(LOADING_LABEL);
        self.current_date = self
            .current_date
            .pred_opt()
            .ok_or(FetchError::DateOutOfRange {
                date: self.current_date,
            })?;
        let bitmap = self.fetch_for_current_date()?;
        self.append_scaled(&bitmap);
        Ok(())
    }

    /// Fetches `count` more days of history, then goes back to the first image.
    pub fn preload(&mut self, count: usize) -> Result<(), FetchError> {
        for _ in 0..count {
            self.load_older_or_shift()?;
        }
        self.viewer.reset_cursor();
        Ok(())
    }

    fn append_scaled(&mut self, bitmap: &RgbaImage) {
        let scaled = self.viewer.scale(bitmap);
        log::info!(
            "Loaded APOD for {} ({}x{})",
            format_date(self.current_date),
            scaled.width(),
            scaled.height()
        );
        self.viewer.append_bitmap(scaled);
    }
}
