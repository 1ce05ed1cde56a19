//! `ccindex config` - print the effective configuration

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

pub fn format_table(config: &Config) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let store = match &config.store.local_root {
        Some(root) => format!("{} (local)", root.display()),
        None => config.store.base_url.clone(),
    };
    table.add_row(vec!["Object store", &store]);
    table.add_row(vec![
        "Output directory",
        &config.output.default_dir.display().to_string(),
    ]);
    table.add_row(vec![
        "Compression level",
        &config.output.compression_level.to_string(),
    ]);
    table.add_row(vec![
        "Workers",
        &format!("{} (max: {})", config.workers.default, config.workers.max),
    ]);
    table.add_row(vec![
        "Wait budget",
        &format!(
            "{}ms, +{}ms per failure, /{} per success",
            config.retry.initial_ms, config.retry.increase_ms, config.retry.decrease_divisor
        ),
    ]);
    table.add_row(vec!["Max attempts", &config.retry.max_attempts.to_string()]);
    table.add_row(vec![
        "Timeouts",
        &format!(
            "connect {}s, read {}s",
            config.http.connect_timeout, config.http.read_timeout
        ),
    ]);
    table.add_row(vec![
        "TOC",
        &format!("{} from {}", config.toc.prefix, config.toc.first_year),
    ]);
    table.add_row(vec![
        "Preload language models",
        if config.language.preload_models {
            "yes"
        } else {
            "no"
        },
    ]);

    table.to_string()
}

pub fn show(config: &Config) {
    eprintln!("\n{}", format_table(config));
}
