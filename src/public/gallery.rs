//! Image gallery landing page

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use handlebars::Handlebars;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::json;

use super::PublicState;
use crate::error::Result;
use crate::templating::register_helpers;

const GALLERY_TEMPLATE: &str = include_str!("../../assets/gallery.hbs");

const CLOUDINARY_BASE: &str = "https://res.cloudinary.com/demo/image/upload/w_300,h_200,c_fill";

const IMAGE_FILES: &[&str] = &[
    "sample.jpg",
    "kitten.jpg",
    "dog.jpg",
    "bird.jpg",
    "landscape.jpg",
    "cat.jpg",
    "flowers.jpg",
    "beach.jpg",
    "coffee.jpg",
    "car.jpg",
    "mountain.jpg",
    "tree.jpg",
    "food.jpg",
    "sunset.jpg",
    "waterfall.jpg",
    "city.jpg",
    "forest.jpg",
    "bridge.jpg",
    "boat.jpg",
    "house.jpg",
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GalleryImage {
    pub url: String,
    pub name: String,
}

impl GalleryImage {
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let path = url::Url::parse(&url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.clone());
        let basename = path.rsplit('/').next().unwrap_or_default();
        let name = basename.split('.').next().unwrap_or_default().to_string();
        Self { url, name }
    }
}

/// The gallery's images in stock order
pub fn gallery_images() -> Vec<GalleryImage> {
    IMAGE_FILES
        .iter()
        .map(|f| GalleryImage::from_url(format!("{CLOUDINARY_BASE}/{f}")))
        .collect()
}

pub struct Gallery {
    hb: Handlebars<'static>,
}

impl Gallery {
    pub fn new() -> Result<Self> {
        let mut hb = Handlebars::new();
        register_helpers(&mut hb);
        hb.register_template_string("index", GALLERY_TEMPLATE)
            .map_err(|e| crate::error::GalleryError::template(e.to_string()))?;
        Ok(Self { hb })
    }

    /// Render the page with a freshly shuffled image order
    pub fn render(&self) -> Result<String> {
        let mut images = gallery_images();
        images.shuffle(&mut rand::thread_rng());
        Ok(self.hb.render("index", &json!({ "images": images }))?)
    }
}

pub async fn index_handler(State(state): State<PublicState>) -> Result<Html<String>> {
    Ok(Html(state.gallery.render()?))
}

pub async fn status_handler() -> impl IntoResponse {
    axum::Json(json!({
        "service": "public-app",
        "note": "Image gallery uses server-side fetching; internal services are reachable only from the server."
    }))
}
