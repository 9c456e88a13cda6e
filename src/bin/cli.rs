use std::io::{self, Write};
use std::sync::Arc;

use cart_reservations::persistence::{
    load_reservations_from_csv, load_reservations_from_json, save_reservations_to_csv,
    save_reservations_to_json,
};
use cart_reservations::report::{self, DEFAULT_UPCOMING_LIMIT};
use cart_reservations::{
    AppConfig, MemoryReservationStore, Requester, Reservation, ReservationRequest,
    ReservationService, SelectedSlot, logging,
};
use chrono::NaiveDate;
use polars::prelude::*;
use uuid::Uuid;

fn cell_text(av: &AnyValue) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::Boolean(v) => {
            if *v {
                "yes".to_string()
            } else {
                String::new()
            }
        }
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        _ => av.to_string(),
    }
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.len()).collect();
    for (ci, col) in columns.iter().enumerate() {
        for row_idx in 0..df.height() {
            if let Ok(av) = col.get(row_idx) {
                widths[ci] = widths[ci].max(cell_text(&av).len());
            }
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');

    out.push('|');
    for (i, name) in col_names.iter().enumerate() {
        out.push_str(&format!(" {:<width$} |", name, width = widths[i]));
    }
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');

    for row_idx in 0..df.height() {
        out.push('|');
        for (ci, col) in columns.iter().enumerate() {
            let s = col.get(row_idx).map(|av| cell_text(&av)).unwrap_or_default();
            out.push_str(&format!(" {:<width$} |", s, width = widths[ci]));
        }
        out.push('\n');
    }

    out.push_str(&sep);
    out.push('\n');
    out
}

const HELP: &str = "\
Commands:
  help                                   Show this help
  courses                                List courses and their equipment
  dates                                  Bookable dates
  template <course> <YYYY-MM-DD>         Block times for a course on a date
  grid <course> <YYYY-MM-DD>             Free carts per block
  free <course> <YYYY-MM-DD> <block>     Free carts for one block
  whoami [<email> <name...>]             Show or set the requester
  reserve <course> <YYYY-MM-DD> <block:unit,...> [justification...]
                                         Book carts (a justification marks it last-minute)
  list [mine]                            Confirmed reservations, one row per cart
  cancel <id>                            Cancel a reservation
  upcoming                               Next reservations per equipment type
  stats                                  Reservation counts
  save <json|csv> <path>                 Export reservations
  load <json|csv> <path>                 Replace reservations from a file
  quit|exit                              Exit
Course names use '_' for spaces, e.g. I_Medio_A.";

fn print_help() {
    println!("{HELP}");
}

fn course_arg(raw: &str) -> String {
    raw.replace('_', " ")
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_slots(raw: &str) -> Option<Vec<SelectedSlot>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (block, unit) = part.trim().split_once(':')?;
            Some(SelectedSlot::new(block.parse().ok()?, unit.parse().ok()?))
        })
        .collect()
}

fn courses_frame(service: &ReservationService) -> PolarsResult<DataFrame> {
    let courses = service.catalog().courses();
    let names: Vec<&str> = courses.iter().map(|c| c.name.as_str()).collect();
    let cohorts: Vec<&str> = courses.iter().map(|c| c.cohort.as_str()).collect();
    let cycles: Vec<&str> = courses.iter().map(|c| c.cycle.as_str()).collect();
    let equipment: Vec<&str> = courses.iter().map(|c| c.equipment.as_str()).collect();
    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("course"), names).into_column(),
        Series::new(PlSmallStr::from_static("cohort"), cohorts).into_column(),
        Series::new(PlSmallStr::from_static("cycle"), cycles).into_column(),
        Series::new(PlSmallStr::from_static("equipment"), equipment).into_column(),
    ])
}

fn grid_frame(
    service: &ReservationService,
    course: &str,
    date: NaiveDate,
) -> Result<DataFrame, String> {
    let grid = service.day_grid(course, date).map_err(|e| e.to_string())?;
    let blocks: Vec<i32> = grid.iter().map(|row| i32::from(row.block.index)).collect();
    let times: Vec<String> = grid.iter().map(|row| row.block.label()).collect();
    let keys: Vec<i32> = grid.iter().map(|row| i32::from(row.key.value())).collect();
    let free: Vec<String> = grid
        .iter()
        .map(|row| {
            row.free_units
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    let open: Vec<bool> = grid.iter().map(|row| row.selectable).collect();
    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("block"), blocks).into_column(),
        Series::new(PlSmallStr::from_static("time"), times).into_column(),
        Series::new(PlSmallStr::from_static("key"), keys).into_column(),
        Series::new(PlSmallStr::from_static("free"), free).into_column(),
        Series::new(PlSmallStr::from_static("open"), open).into_column(),
    ])
    .map_err(|e| e.to_string())
}

fn print_ledger(reservations: &[Reservation]) {
    if reservations.is_empty() {
        println!("No reservations.");
        return;
    }
    match report::ledger_frame(reservations) {
        Ok(df) => println!("{}", render_df_as_text_table(&df)),
        Err(e) => println!("Error: {}", e),
    }
}

fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    logging::init(config.log_format, config.verbose);

    let store = Arc::new(MemoryReservationStore::new());
    let service = ReservationService::new(store.clone(), config.clock())
        .with_calendar(config.school_calendar())
        .with_horizon_days(config.horizon_days);
    let mut requester = Requester::new("cli", "cli@localhost", "CLI user");

    println!("Cart Reservations (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "courses" => match courses_frame(&service) {
                Ok(df) => println!("{}", render_df_as_text_table(&df)),
                Err(e) => println!("Error: {}", e),
            },
            "dates" => {
                let dates = service.available_dates();
                if dates.is_empty() {
                    println!("No bookable dates.");
                }
                for date in dates {
                    println!("{} {}", date, date.format("%A"));
                }
            }
            "template" => match (parts.next(), parts.next().and_then(parse_date)) {
                (Some(course), Some(date)) => match service.template(&course_arg(course), date) {
                    Ok(template) => {
                        for block in &template.blocks {
                            println!("{:>2}  {}", block.index, block.label());
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                },
                _ => println!("Usage: template <course> <YYYY-MM-DD>"),
            },
            "grid" => match (parts.next(), parts.next().and_then(parse_date)) {
                (Some(course), Some(date)) => {
                    match grid_frame(&service, &course_arg(course), date) {
                        Ok(df) => println!("{}", render_df_as_text_table(&df)),
                        Err(e) => println!("Error: {}", e),
                    }
                }
                _ => println!("Usage: grid <course> <YYYY-MM-DD>"),
            },
            "free" => {
                let course = parts.next();
                let date = parts.next().and_then(parse_date);
                let block = parts.next().and_then(|b| b.parse::<u8>().ok());
                match (course, date, block) {
                    (Some(course), Some(date), Some(block)) => {
                        match service.free_units(&course_arg(course), Some(date), block) {
                            Ok(free) if free.is_empty() => println!("No free carts."),
                            Ok(free) => println!(
                                "Free: {}",
                                free.iter().map(u8::to_string).collect::<Vec<_>>().join(", ")
                            ),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: free <course> <YYYY-MM-DD> <block>"),
                }
            }
            "whoami" => {
                let email = parts.next();
                let name: Vec<&str> = parts.collect();
                match email {
                    Some(email) => {
                        let name = if name.is_empty() {
                            email.to_string()
                        } else {
                            name.join(" ")
                        };
                        requester = Requester::new(email, email, name);
                        println!("Requester set to {} <{}>", requester.name, requester.email);
                    }
                    None => println!("{} <{}>", requester.name, requester.email),
                }
            }
            "reserve" => {
                let course = parts.next();
                let date = parts.next().and_then(parse_date);
                let slots = parts.next().and_then(parse_slots);
                let justification: Vec<&str> = parts.collect();
                match (course, date, slots) {
                    (Some(course), Some(date), Some(slots)) => {
                        let justification = justification.join(" ");
                        let request = ReservationRequest {
                            course: course_arg(course),
                            date,
                            is_last_minute: !justification.is_empty(),
                            justification,
                            accepted_terms: true,
                            slots,
                            requester: requester.clone(),
                        };
                        match service.submit(&request) {
                            Ok(reservation) => {
                                println!("Reserved {}", reservation.id);
                                print_ledger(std::slice::from_ref(&reservation));
                            }
                            Err(e) => {
                                println!("Error: {}", e);
                                if e.needs_refresh() {
                                    println!("Availability changed; run 'grid' again.");
                                }
                            }
                        }
                    }
                    _ => println!(
                        "Usage: reserve <course> <YYYY-MM-DD> <block:unit,...> [justification...]"
                    ),
                }
            }
            "list" => {
                let listed = match parts.next() {
                    Some("mine") => service.reservations_for(&requester.email),
                    _ => service.all_reservations(),
                };
                match listed {
                    Ok(reservations) => print_ledger(&reservations),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "cancel" => match parts.next().map(Uuid::parse_str) {
                Some(Ok(id)) => match service.cancel(id) {
                    Ok(()) => println!("Cancelled {}", id),
                    Err(e) => println!("Error: {}", e),
                },
                Some(Err(_)) => println!("Invalid reservation id"),
                None => println!("Usage: cancel <id>"),
            },
            "upcoming" => match service.upcoming(DEFAULT_UPCOMING_LIMIT) {
                Ok(upcoming) => {
                    println!("Chromebook:");
                    print_ledger(&upcoming.chromebook);
                    println!("Tablet:");
                    print_ledger(&upcoming.tablet);
                }
                Err(e) => println!("Error: {}", e),
            },
            "stats" => match service.statistics() {
                Ok(stats) => {
                    println!("{}", stats.to_cli_summary());
                    for entry in &stats.by_requester {
                        println!("  {} <{}>: {}", entry.name, entry.email, entry.count);
                    }
                }
                Err(e) => println!("Error: {}", e),
            },
            "save" | "load" => {
                let format = parts.next();
                let path = parts.next();
                let result = match (cmd, format, path) {
                    ("save", Some("json"), Some(path)) => {
                        save_reservations_to_json(&store.snapshot(), path)
                    }
                    ("save", Some("csv"), Some(path)) => {
                        save_reservations_to_csv(&store.snapshot(), path)
                    }
                    ("load", Some("json"), Some(path)) => {
                        load_reservations_from_json(path).and_then(|r| store.replace_all(r))
                    }
                    ("load", Some("csv"), Some(path)) => {
                        load_reservations_from_csv(path).and_then(|r| store.replace_all(r))
                    }
                    _ => {
                        println!("Usage: {} <json|csv> <path>", cmd);
                        continue;
                    }
                };
                match result {
                    Ok(()) if cmd == "save" => println!("Saved {} reservation(s).", store.len()),
                    Ok(()) => println!("Loaded {} reservation(s).", store.len()),
                    Err(e) => println!("Error: {}", e),
                }
            }
            _ => {
                println!("Unknown command. Type 'help'.");
            }
        }
    }
}
