//! # Rendering Module
//!
//! Turns a `CmdResult` into terminal text. Layout (column widths, padding) is
//! computed here with `unicode-width` so names with wide or accented
//! characters still line up; colors come from [`super::styles`].
//!
//! Sections are rendered in a fixed order: listed residents, affected
//! residents, the report, then messages.

use super::styles;
use shelterapp::commands::{CmdMessage, CmdResult, MessageLevel, Report};
use shelterapp::commands::cleanup::CleanupResult;
use shelterapp::model::ResidentRecord;
use shelterapp::roster::{RosterEntry, SyncState};
use shelterapp::views::{KitchenEntry, Occupancy};
use unicode_width::UnicodeWidthStr;

pub const PENDING_MARKER: &str = "*";

/// Left-align `text` in a column of `width` display cells.
fn pad(text: &str, width: usize) -> String {
    let used = text.width();
    if used >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - used))
    }
}

/// Render rows as aligned columns under a header line.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.width());
        }
    }

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w))
        .collect();
    out.push_str(&format!(
        "{}\n",
        styles::header().apply_to(header_line.join("  ").trim_end())
    ));
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| pad(c, *w))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn resident_rows(residents: &[ResidentRecord]) -> Vec<Vec<String>> {
    residents
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.badge.clone(),
                r.full_name(),
                r.room.clone(),
                r.status.clone(),
            ]
        })
        .collect()
}

pub fn render_residents(residents: &[ResidentRecord]) -> String {
    if residents.is_empty() {
        return format!("{}\n", styles::muted().apply_to("No residents found."));
    }
    table(
        &["ID", "BADGE", "NAME", "ROOM", "STATUS"],
        &resident_rows(residents),
    )
}

fn render_affected(entries: &[RosterEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let marker = match entry.sync {
            SyncState::Synced => String::new(),
            SyncState::Pending => format!(" {}", styles::pending().apply_to(PENDING_MARKER)),
        };
        out.push_str(&format!(
            "  {} {} {}{}\n",
            styles::muted().apply_to(format!("#{}", entry.id())),
            styles::badge().apply_to(&entry.record.badge),
            entry.record.full_name(),
            marker
        ));
    }
    out
}

fn render_kitchen(list: &[KitchenEntry]) -> String {
    if list.is_empty() {
        return format!("{}\n", styles::muted().apply_to("Nobody on the kitchen list."));
    }
    let rows: Vec<Vec<String>> = list
        .iter()
        .map(|k| {
            vec![
                k.room.clone(),
                k.badge.clone(),
                k.name.clone(),
                k.kitchen_schedule.clone(),
                k.meal_preference.clone(),
            ]
        })
        .collect();
    table(&["ROOM", "BADGE", "NAME", "SCHEDULE", "MEAL"], &rows)
}

fn render_occupancy(occupancy: &Occupancy) -> String {
    let mut out = String::new();
    for room in &occupancy.rooms {
        let beds = match room.max_beds {
            Some(max) => format!("{}/{} beds", room.occupants.len(), max),
            None => format!("{} residents, not a bedroom", room.occupants.len()),
        };
        let beds = if room.over_capacity {
            styles::warning().apply_to(format!("{} (over capacity)", beds))
        } else {
            styles::muted().apply_to(beds)
        };
        out.push_str(&format!("{}  {}\n", styles::header().apply_to(&room.room), beds));
        for occupant in &room.occupants {
            out.push_str(&format!(
                "  bed {}  {} {}\n",
                occupant.bed,
                styles::badge().apply_to(&occupant.badge),
                occupant.name
            ));
        }
    }
    out.push_str(&format!(
        "{} occupied: {} north, {} south, {} without a room\n",
        occupancy.occupied, occupancy.north, occupancy.south, occupancy.unassigned
    ));
    out.push_str(&format!(
        "{} of {} beds free ({}% occupied)\n",
        occupancy.free_beds, occupancy.capacity, occupancy.occupancy_percent
    ));
    out
}

fn render_cleanup(label: &str, result: &CleanupResult) -> String {
    let state = if result.success {
        styles::success().apply_to("ok")
    } else {
        styles::error().apply_to("failed")
    };
    format!(
        "{} {} ({}, {} files deleted)\n",
        label,
        result.folder_path,
        state,
        result.deleted_files.len()
    )
}

fn render_report(report: &Report) -> String {
    match report {
        Report::Migration(m) => {
            let mut out = String::new();
            for doc in &m.transferred_documents {
                out.push_str(&format!(
                    "  {} {} {}\n",
                    doc.original_path,
                    styles::muted().apply_to("->"),
                    doc.new_path
                ));
            }
            if let Some(cleanup) = &m.folder_cleanup {
                if cleanup.attempted {
                    out.push_str(&format!(
                        "Source folder cleanup: {} files deleted\n",
                        cleanup.deleted_files.len()
                    ));
                }
            }
            out
        }
        Report::Sync(s) => format!("{} of {} files synced\n", s.synced, s.total),
        Report::Cleanup(c) => {
            let mut out = render_cleanup("IN ", &c.incoming);
            out.push_str(&render_cleanup("OUT", &c.departed));
            out
        }
        Report::TransferStatus(t) => format!(
            "IN documents:  {}\nOUT documents: {}\nTransferred:   {}\n",
            t.in_documents,
            t.out_documents,
            if t.has_transferred { "yes" } else { "no" }
        ),
        Report::Duplicates(d) => {
            let mut out = String::new();
            for id in &d.removed {
                out.push_str(&format!("  {} {}\n", styles::muted().apply_to("removed"), id));
            }
            out
        }
        Report::Kitchen(list) => render_kitchen(list),
        Report::Occupancy(o) => render_occupancy(o),
    }
}

pub fn render_messages(messages: &[CmdMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        let (prefix, style) = match message.level {
            MessageLevel::Info => ("", styles::info()),
            MessageLevel::Success => ("", styles::success()),
            MessageLevel::Warning => ("Warning: ", styles::warning()),
            MessageLevel::Error => ("Error: ", styles::error()),
        };
        out.push_str(&format!(
            "{}\n",
            style.apply_to(format!("{}{}", prefix, message.content))
        ));
    }
    out
}

pub fn render_result(result: &CmdResult, listing: bool) -> String {
    let mut out = String::new();
    if listing {
        out.push_str(&render_residents(&result.listed));
    }
    out.push_str(&render_affected(&result.affected));
    if let Some(report) = &result.report {
        out.push_str(&render_report(report));
    }
    out.push_str(&render_messages(&result.messages));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use console::strip_ansi_codes;
    use shelterapp::commands::sync::SyncReport;

    fn plain(s: &str) -> String {
        strip_ansi_codes(s).to_string()
    }

    fn resident(id: i64, badge: &str, first: &str, last: &str, room: &str) -> ResidentRecord {
        ResidentRecord::new(badge, first, last)
            .with_room(room)
            .with_id(id)
    }

    #[test]
    fn test_resident_table_aligns_wide_names() {
        let rows = vec![
            resident(1, "24191", "Jöhn", "Doe", "1.04"),
            resident(12, "7", "Åsa", "Ström", "2.10"),
        ];
        let out = plain(&render_residents(&rows));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        let room_col = |line: &str| line.find("1.04").or_else(|| line.find("2.10"));
        let a = lines[1][..room_col(lines[1]).unwrap()].width();
        let b = lines[2][..room_col(lines[2]).unwrap()].width();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(plain(&render_residents(&[])), "No residents found.\n");
    }

    #[test]
    fn test_messages_have_level_prefixes() {
        let out = plain(&render_messages(&[
            CmdMessage::success("Added resident"),
            CmdMessage::warning("saved locally only"),
            CmdMessage::error("boom"),
        ]));
        assert_eq!(
            out,
            "Added resident\nWarning: saved locally only\nError: boom\n"
        );
    }

    #[test]
    fn test_occupancy_flags_overfull_room() {
        let records = vec![
            resident(1, "1", "Ana", "Lima", "1.15"),
            resident(2, "2", "Eva", "Rossi", "1.15"),
        ];
        let out = plain(&render_occupancy(&shelterapp::views::occupancy(&records)));
        assert!(out.contains("1.15  2/1 beds (over capacity)"));
        assert!(out.contains("1.16  0/3 beds\n"));
        assert!(out.ends_with("59 of 60 beds free (3% occupied)\n"));
    }

    #[test]
    fn test_sync_report_line() {
        let result = CmdResult::default().with_report(Report::Sync(SyncReport {
            synced: 2,
            total: 3,
            errors: vec![],
        }));
        assert_eq!(plain(&render_result(&result, false)), "2 of 3 files synced\n");
    }
}
