use askama::{Error as AskamaError, Template};
use thiserror::Error;

use crate::application::listing::ListRow;
use crate::domain::entities::CategoryRecord;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }

    pub fn origin(&self) -> &'static str {
        self.source
    }
}

#[derive(Template)]
#[template(path = "archive/list.html")]
pub struct ArchiveListTemplate<'a> {
    pub rows: &'a [ListRow],
}

/// The complete embeddable archive: filter controls, action buttons and the
/// initial listing.
#[derive(Template)]
#[template(path = "archive/surface.html")]
pub struct ArchiveSurfaceTemplate<'a> {
    pub atts_json: String,
    pub nonce: String,
    pub show_filters: bool,
    pub show_categories: bool,
    pub categories: &'a [CategoryRecord],
    pub show_export: bool,
    pub enable_csv_export: bool,
    pub enable_markdown_export: bool,
    pub copy_button_text: &'a str,
    pub export_button_text: &'a str,
    /// Already-rendered listing fragment, inserted unescaped.
    pub listing_html: &'a str,
}

pub fn render_template<T: Template>(template: T) -> Result<String, TemplateRenderError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
    })
}

/// HTML fragment for the listing surface.
pub fn render_archive_list(rows: &[ListRow]) -> Result<String, TemplateRenderError> {
    render_template(ArchiveListTemplate { rows })
}

pub fn render_archive_surface(
    surface: ArchiveSurfaceTemplate<'_>,
) -> Result<String, TemplateRenderError> {
    render_template(surface)
}
