use unicode_width::UnicodeWidthStr;

use crate::catalog::DerivedResult;
use crate::db::models::*;

/// Format duration in seconds to human-readable string.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return "-".to_string();
    };
    let total = seconds as u64;
    let m = total / 60;
    let s = total % 60;
    if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

pub fn format_price(price: f64) -> String {
    format!("${price:.2}")
}

/// Truncate a string to fit within max_width (respecting unicode width).
fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw + 3 > max_width {
            result.push_str("...");
            break;
        }
        result.push(ch);
        width += cw;
    }
    result
}

/// Left-pad to `width` display columns; `{:<N}` counts chars, not columns.
fn pad(s: &str, width: usize) -> String {
    let s = truncate(s, width);
    let fill = width.saturating_sub(UnicodeWidthStr::width(s.as_str()));
    format!("{s}{}", " ".repeat(fill))
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Format the filtered catalog as a table.
pub fn print_product_list(result: &DerivedResult<Product>) {
    if result.items.is_empty() {
        println!("No products match ({} in catalog).", result.total_count);
        return;
    }

    println!(
        "Showing {} of {} product{}:\n",
        result.filtered_count,
        result.total_count,
        plural(result.total_count)
    );

    println!(
        "  {} {} {} {:>10} {:>8}",
        pad("NAME", 32),
        pad("CATEGORY", 14),
        pad("EFFECT", 14),
        "PRICE",
        "DURATION"
    );
    println!("  {}", "-".repeat(82));

    for p in &result.items {
        let marker = if p.active { "" } else { " (inactive)" };
        println!(
            "  {} {} {} {:>10} {:>8}",
            pad(&format!("{}{marker}", p.name), 32),
            pad(&p.category, 14),
            pad(p.effect.as_deref().unwrap_or("-"), 14),
            format_price(p.price),
            format_duration(p.duration_seconds),
        );
        let mut meta = vec![format!("id: {}", p.id)];
        if let Some(ref code) = p.code {
            meta.push(format!("code: {code}"));
        }
        if let Some(ref m) = p.manufacturer {
            meta.push(format!("by {m}"));
        }
        println!("    {}", truncate(&meta.join("  "), 80));
    }
}

/// Format a single product's details for `fireshow show`.
pub fn print_product_detail(p: &Product) {
    println!("Product: {}", p.name);
    println!("  ID:           {}", p.id);
    if let Some(ref code) = p.code {
        println!("  Code:         {code}");
    }
    if let Some(ref m) = p.manufacturer {
        println!("  Manufacturer: {m}");
    }
    println!("  Category:     {}", p.category);
    println!("  Effect:       {}", p.effect.as_deref().unwrap_or("-"));
    println!("  Price:        {}", format_price(p.price));
    println!("  Duration:     {}", format_duration(p.duration_seconds));
    println!("  Active:       {}", if p.active { "yes" } else { "no" });
    if let Some(ref url) = p.image_url {
        println!("  Image:        {url}");
    }
    println!("  Updated:      {}", p.updated_at);

    if !p.description.is_empty() {
        println!("\nDescription:");
        for line in p.description.lines() {
            println!("  {line}");
        }
    }
}

/// Format quote requests as a table.
pub fn print_quote_list(quotes: &[QuoteRequest]) {
    if quotes.is_empty() {
        println!("No quote requests found.");
        return;
    }

    println!("{} quote request{}:\n", quotes.len(), plural(quotes.len()));
    println!(
        "  {} {} {} {} {}",
        pad("NAME", 24),
        pad("EVENT", 10),
        pad("DATE", 12),
        pad("STATUS", 10),
        "RECEIVED"
    );
    println!("  {}", "-".repeat(76));

    for q in quotes {
        println!(
            "  {} {} {} {} {}",
            pad(&q.name, 24),
            pad(q.event_type.as_str(), 10),
            pad(&q.event_date, 12),
            pad(q.status.as_str(), 10),
            q.created_at.get(..10).unwrap_or(&q.created_at),
        );
        println!("    id: {}  {}", q.id, q.email);
    }
}

pub fn print_quote_detail(q: &QuoteRequest) {
    println!("Quote request from {}", q.name);
    println!("  ID:       {}", q.id);
    println!("  Status:   {}", q.status);
    println!("  Email:    {}", q.email);
    println!("  Phone:    {}", q.phone);
    println!("  Event:    {} on {}", q.event_type, q.event_date);
    println!("  Location: {}", q.location);
    if let Some(n) = q.guest_count {
        println!("  Guests:   {n}");
    }
    if let Some(b) = q.budget {
        println!("  Budget:   {}", format_price(b));
    }
    if let Some(ref i) = q.interest {
        println!("  Interest: {i}");
    }
    println!("  Received: {}", q.created_at);
    if !q.message.is_empty() {
        println!("\nMessage:");
        for line in q.message.lines() {
            println!("  {line}");
        }
    }
}

pub fn print_staff_list(staff: &[StaffMember]) {
    if staff.is_empty() {
        println!("No staff members. Add the first admin with `fireshow staff add <email> --role admin`.");
        return;
    }
    for s in staff {
        println!("  {} {}", pad(&s.email, 36), s.role);
    }
}

/// Print database stats.
pub fn print_stats(stats: &DbStats) {
    println!("Database Statistics:");
    println!("  Products:       {} ({} active)", stats.products, stats.active_products);
    println!(
        "  Quote Requests: {} ({} open)",
        stats.quote_requests, stats.open_quote_requests
    );
    println!("  Staff:          {}", stats.staff);
    println!("  DB Size:        {}", format_bytes(stats.db_size_bytes));
    if !stats.categories.is_empty() {
        println!("\n  Categories:");
        for c in &stats.categories {
            println!("    {} {}", pad(&c.category, 20), c.count);
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(None), "-");
        assert_eq!(format_duration(Some(45.0)), "45s");
        assert_eq!(format_duration(Some(125.0)), "2m05s");
    }

    #[test]
    fn truncate_respects_display_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(UnicodeWidthStr::width(pad("花火", 6).as_str()), 6);
    }
}
