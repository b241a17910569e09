use crate::config::site::SiteContext;

/// Headings beyond this count are left out of the prompt.
pub const MAX_HEADINGS: usize = 10;

pub fn system_prompt(site: &SiteContext) -> String {
    let mut prompt = format!(
        "You are a friendly, professional AI assistant acting as the concierge of {}'s personal website.\n\n\
         Your responsibilities:\n\
         1. Answer visitors' questions about {}\n\
         2. Introduce the site's content and background\n\
         3. Provide contact details and social links\n\
         4. Keep answers concise and accurate\n",
        site.owner,
        site.owner
    );

    let summary = website_summary(site);
    if !summary.is_empty() {
        prompt.push_str("\n=== Website information ===\n");
        prompt.push_str(&summary);
    }

    if !site.contact.is_empty() {
        prompt.push_str("\n=== Contact ===\n");
        for (label, value) in &site.contact {
            prompt.push_str(&format!("{}: {}\n", label, value));
        }
    }

    prompt.push_str(
        "\nAnswer in a friendly, professional tone. If a question is outside what you know, say so honestly."
    );
    prompt
}

pub fn website_summary(site: &SiteContext) -> String {
    let mut summary = String::new();
    if !site.title.trim().is_empty() {
        summary.push_str(&format!("Title: {}\n", site.title.trim()));
    }
    if let Some(description) = site.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        summary.push_str(&format!("Description: {}\n", description));
    }

    push_list(&mut summary, "Navigation", site.navigation.iter());
    push_list(&mut summary, "Main content", site.headings.iter().take(MAX_HEADINGS));
    summary
}

fn push_list<'a>(out: &mut String, heading: &str, items: impl Iterator<Item = &'a String>) {
    let items: Vec<&str> = items
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("\n{}:\n", heading));
    for item in items {
        out.push_str(&format!("  - {}\n", item));
    }
}
