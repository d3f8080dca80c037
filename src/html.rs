//! `<img>` discovery and rewriting.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lol_html::{element, rewrite_str, RewriteStrSettings};

use crate::error::Result;

/// Returns every `<img src>` value in document order, duplicates removed.
///
/// Values are returned as written in the markup, with character references
/// still encoded.
pub fn extract_image_sources(html: &str) -> Result<Vec<String>> {
    let sources = Rc::new(RefCell::new(Vec::<String>::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img[src]", {
                let sources = Rc::clone(&sources);
                move |el| {
                    if let Some(src) = el.get_attribute("src") {
                        let mut sources = sources.borrow_mut();
                        if !src.is_empty() && !sources.contains(&src) {
                            sources.push(src);
                        }
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )?;

    let sources = sources.borrow().clone();
    Ok(sources)
}

/// Replaces each `<img src>` found in `replacements` with its mapped value.
pub fn replace_image_sources(html: &str, replacements: &HashMap<String, String>) -> Result<String> {
    if replacements.is_empty() {
        return Ok(html.to_string());
    }

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img[src]", |el| {
                if let Some(new_src) = el
                    .get_attribute("src")
                    .and_then(|src| replacements.get(&src))
                {
                    el.set_attribute("src", new_src)?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(rewritten)
}
