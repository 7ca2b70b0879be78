use crate::controllers::upload::UploadController;
use crate::core::constants::ids;
use crate::prelude::Duration;
use egui::{Color32, Response, RichText, Ui, Widget};
use std::path::PathBuf;

const ERROR_COLOR: Color32 = Color32::from_rgb(204, 0, 0);

/// File picker plus info line for uploading data to the backend.
///
/// Files can also be dropped onto the window. While an upload is running the
/// picker is disabled and the info line reads "Loading…".
pub struct UploadPanel<'a> {
    upload: &'a mut UploadController,
    button_text: String,
}

impl<'a> UploadPanel<'a> {
    pub fn new(upload: &'a mut UploadController) -> Self {
        Self {
            upload,
            button_text: "Upload file…".to_string(),
        }
    }

    pub fn button_text(mut self, text: impl Into<String>) -> Self {
        self.button_text = text.into();
        self
    }
}

fn upload_dialog() -> rfd::FileDialog {
    rfd::FileDialog::new()
        .set_title("Upload IP networks")
        .add_filter("CSV", &["csv", "txt"])
        .add_filter("All files", &["*"])
}

impl Widget for UploadPanel<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let UploadPanel {
            upload,
            button_text,
        } = self;

        if upload.poll() {
            ui.ctx().request_repaint();
        }

        let dropped = ui.ctx().input(|i| i.raw.dropped_files.clone());
        if !dropped.is_empty() {
            log::info!("Files dropped: {}", dropped.len());
            let paths: Vec<PathBuf> = dropped.iter().filter_map(|f| f.path.clone()).collect();
            if !paths.is_empty() {
                upload.select_files(paths);
            } else if let Some(bytes) = dropped.iter().find_map(|f| f.bytes.clone()) {
                let name = dropped
                    .iter()
                    .map(|f| f.name.clone())
                    .find(|name| !name.is_empty())
                    .unwrap_or_else(|| ids::FILE_INPUT.to_string());
                upload.upload_bytes(name, bytes.to_vec());
            }
        }

        let inner = ui.push_id(ids::UPLOAD_FORM, |ui| {
            ui.horizontal(|ui| {
                let picker = ui.push_id(ids::FILE_INPUT, |ui| {
                    ui.add_enabled(upload.input_enabled(), egui::Button::new(button_text))
                });
                if picker.inner.clicked() {
                    if let Some(path) = upload_dialog().pick_file() {
                        upload.select_files([path]);
                    }
                }

                let mut info = RichText::new(upload.info_text());
                if upload.is_error() {
                    info = info.color(ERROR_COLOR);
                }
                ui.push_id(ids::UPLOAD_INFO, |ui| ui.label(info));
            })
        });

        if upload.is_uploading() {
            ui.ctx().request_repaint_after(Duration::from_millis(100));
        }

        inner.response
    }
}
