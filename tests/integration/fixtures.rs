// tests/integration/fixtures.rs

//! Shared simulated site used across the integration tests.

use browsergate::driver::{ClickEffect, SimDriver, SimElement, SimPage};

pub const EXAMPLE_URL: &str = "https://example.com/";
pub const NEXT_URL: &str = "https://example.com/next";
pub const HEADLINE: &str = "Example Domain";

/// Installs a small two-page site:
///
/// - `/` has a headline, a paragraph, a link that navigates to `/next`, a
///   button that rewrites the paragraph in place, and a search input.
/// - `/next` has its own headline.
pub fn install_example_site(driver: &SimDriver) {
    driver.install_page(
        EXAMPLE_URL,
        SimPage::new(HEADLINE)
            .element(SimElement::new("h1", "h1").text(HEADLINE))
            .element(
                SimElement::new("p.lead", "p").text("This domain is for use in examples."),
            )
            .element(
                SimElement::new("a.more", "a")
                    .text("More information...")
                    .attr("href", NEXT_URL)
                    .on_click(ClickEffect::Navigate(NEXT_URL.to_string())),
            )
            .element(
                SimElement::new("button#rewrite", "button")
                    .text("Rewrite")
                    .on_click(ClickEffect::SetText {
                        selector: "p.lead".to_string(),
                        text: "rewritten".to_string(),
                    }),
            )
            .element(SimElement::new("input#q", "input").editable())
            .element(SimElement::new("span.ghost", "span").text("hidden").hidden()),
    );
    driver.install_page(
        NEXT_URL,
        SimPage::new("More information").element(
            SimElement::new("h1", "h1").text("More information"),
        ),
    );
}
