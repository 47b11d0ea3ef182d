//! Landing page: a college picker that navigates to `/<slug>`.

use laundry_core::{COLLEGES, DEFAULT_COLLEGE};

use super::escape;

const LANDING_HTML_TEMPLATE: &str = include_str!("landing.html");

fn college_options() -> String {
    COLLEGES
        .iter()
        .map(|college| {
            let selected = if college.slug == DEFAULT_COLLEGE {
                " selected"
            } else {
                ""
            };
            format!(
                "                <option value=\"{}\"{}>{}</option>",
                escape(college.slug),
                selected,
                escape(college.name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render(version: &str) -> String {
    LANDING_HTML_TEMPLATE
        .replace("{options}", &college_options())
        .replace("{version}", &escape(version))
}
