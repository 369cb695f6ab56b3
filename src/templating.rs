//! Handlebars helpers shared by the gallery page and the admin renderer

use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, handlebars_helper,
};

/// Percent-encode every reserved character, `/` included
pub fn urlencode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Register `urlencode`, `upper`, `lower` and `json`
pub fn register_helpers(hb: &mut Handlebars<'_>) {
    hb.register_helper("urlencode", Box::new(urlencode_helper));
    hb.register_helper("upper", Box::new(upper_helper));
    hb.register_helper("lower", Box::new(lower_helper));
    hb.register_helper("json", Box::new(json_helper));
}

fn urlencode_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&urlencode(param))?;
    Ok(())
}

handlebars_helper!(upper_helper: |s: str| s.to_uppercase());
handlebars_helper!(lower_helper: |s: str| s.to_lowercase());

fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    if let Some(v) = h.param(0) {
        out.write(&serde_json::to_string(v.value()).unwrap_or_default())?;
    }
    Ok(())
}
