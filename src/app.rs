use std::sync::mpsc::Sender;
use std::time::Duration;

use chrono::NaiveDate;
use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions, ViewportCommand};
use image::RgbaImage;

use crate::apod::{format_date, ApodClient, FetchError};
use crate::apod_viewer::{ApodViewer, ViewerSettings};
use crate::renderer::render_rgba;
use crate::viewer::{Clock, Key, Screen, ViewerEvent, TICKS_PER_SECOND, WINDOW_SIZE};

pub const APP_TITLE: &str = "Space Of The Day";
const LABEL_FONT_SIZE: f32 = 32.0;

#[derive(Default)]
struct StagedFrame {
    image: Option<ColorImage>,
    image_changed: bool,
    label: Option<String>,
}

/// `Screen` backed by an egui texture. Drawing calls are staged and become
/// visible on `present`; every egui frame repaints the last presented frame.
pub struct EguiScreen {
    ctx: egui::Context,
    staged: StagedFrame,
    texture: Option<TextureHandle>,
    label: Option<String>,
    uploads: usize,
}

impl EguiScreen {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            staged: StagedFrame::default(),
            texture: None,
            label: None,
            uploads: 0,
        }
    }

    fn upload_staged_image(&mut self) {
        let Some(color_image) = self.staged.image.clone() else {
            self.texture = None;
            return;
        };

        self.uploads += 1;
        if let Some(texture) = self.texture.as_mut() {
            texture.set(color_image, TextureOptions::LINEAR);
        } else {
            self.texture = Some(self.ctx.load_texture(
                "apod-image",
                color_image,
                TextureOptions::LINEAR,
            ));
        }
    }

    pub fn paint(&self, ui: &mut egui::Ui) {
        let origin = ui.max_rect().min;
        let painter = ui.painter();
        painter.rect_filled(ui.max_rect(), 0.0, egui::Color32::BLACK);

        if let Some(texture) = self.texture.as_ref() {
            let rect = egui::Rect::from_min_size(origin, texture.size_vec2());
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(texture.id(), rect, uv, egui::Color32::WHITE);
        }

        if let Some(label) = self.label.as_deref() {
            painter.text(
                origin,
                egui::Align2::LEFT_TOP,
                label,
                egui::FontId::proportional(LABEL_FONT_SIZE),
                egui::Color32::WHITE,
            );
        }
    }
}

impl Screen for EguiScreen {
    fn size(&self) -> [u32; 2] {
        WINDOW_SIZE
    }

    fn clear(&mut self) {
        self.staged.image = None;
        self.staged.image_changed = true;
        self.staged.label = None;
    }

    fn blit(&mut self, bitmap: &RgbaImage) {
        self.staged.image = Some(render_rgba(bitmap));
        self.staged.image_changed = true;
    }

    fn draw_label(&mut self, text: &str) {
        self.staged.label = Some(text.to_string());
    }

    fn present(&mut self) {
        if self.staged.image_changed {
            self.upload_staged_image();
            self.staged.image_changed = false;
        }
        self.label = self.staged.label.clone();
        self.ctx.request_repaint();
    }
}

pub struct ApodViewerApp {
    viewer: ApodViewer<EguiScreen, ApodClient>,
    fatal_errors: Sender<FetchError>,
    closing: bool,
}

impl ApodViewerApp {
    pub fn new(
        ctx: &egui::Context,
        client: ApodClient,
        today: NaiveDate,
        settings: ViewerSettings,
        fatal_errors: Sender<FetchError>,
    ) -> Self {
        let screen = EguiScreen::new(ctx.clone());
        let clock = Clock::new(TICKS_PER_SECOND);
        Self {
            viewer: ApodViewer::new(screen, client, today, clock, settings),
            fatal_errors,
            closing: false,
        }
    }

    fn collect_events(ctx: &egui::Context) -> Vec<ViewerEvent> {
        ctx.input(|input| viewer_events(&input.events, input.viewport().close_requested()))
    }

    fn close(&mut self, ctx: &egui::Context) {
        if !self.closing {
            self.closing = true;
            ctx.send_viewport_cmd(ViewportCommand::Close);
        }
    }
}

/// Fresh arrow-key presses in order, then `Close` if the window asked to close.
fn viewer_events(events: &[egui::Event], close_requested: bool) -> Vec<ViewerEvent> {
    let mut viewer_events = events
        .iter()
        .filter_map(|event| match event {
            egui::Event::Key {
                key,
                pressed: true,
                repeat: false,
                ..
            } => viewer_key(*key).map(ViewerEvent::KeyPressed),
            _ => None,
        })
        .collect::<Vec<_>>();
    if close_requested {
        viewer_events.push(ViewerEvent::Close);
    }
    viewer_events
}

fn viewer_key(key: egui::Key) -> Option<Key> {
    match key {
        egui::Key::ArrowLeft => Some(Key::Left),
        egui::Key::ArrowRight => Some(Key::Right),
        egui::Key::ArrowUp => Some(Key::Up),
        egui::Key::ArrowDown => Some(Key::Down),
        _ => None,
    }
}

impl eframe::App for ApodViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.viewer.is_loading() {
            ctx.set_cursor_icon(egui::CursorIcon::Progress);
        } else {
            ctx.set_cursor_icon(egui::CursorIcon::Default);
        }

        if !self.closing {
            let events = Self::collect_events(ctx);
            if let Err(err) = self.viewer.tick(&events) {
                log::error!(
                    "Fetching the APOD for {} failed: {err}",
                    format_date(self.viewer.current_date())
                );
                if let Err(unsent) = self.fatal_errors.send(err) {
                    log::error!("Could not report the fetch error to main: {unsent}");
                }
                self.close(ctx);
            }
            if !self.viewer.is_running() {
                self.close(ctx);
            }
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                self.viewer.viewer().screen().paint(ui);
            });

        ctx.request_repaint_after(Duration::from_secs(1) / TICKS_PER_SECOND);
    }
}
