use crate::facets::FacetIndex;
use crate::models::InventoryRecord;
use askama::Template;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    environments: &'a [String],
    websites: &'a [InventoryRecord],
    // facets handed to the page script, see `script_json`
    facets_json: String,
}

/// Full inventory page: environments, every record, and the facet index
/// embedded for the client-side filters.
pub fn render_index(websites: &[InventoryRecord], facets: &FacetIndex) -> Result<String, RenderError> {
    let page = IndexTemplate {
        environments: &facets.environments,
        websites,
        facets_json: script_json(facets)?,
    };
    Ok(page.render()?)
}

/// JSON safe to inline in a `<script>` element.
fn script_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace('<', "\\u003c"))
}
