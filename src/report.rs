//! Reports over a chat-history database export.
//!
//! The export holds a message table `WL_MSG` (`room_name`, `talker`,
//! `type_name`, `content`, `CreateTime`, `Is_sender`) and a contact table
//! `Contact` (`UserName`, `NickName`, `Remark`). Group rooms carry
//! `chatroom` in their id.

use std::path::Path;

use chrono::{Local, TimeZone};
use log::{debug, info};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;

use crate::decode::extract_message_text;
use crate::error::{AnalysisError, Result};
use crate::pipeline::{CloudPipeline, Visualization};
use crate::render::Renderer;

/// Message type of plain text messages.
pub const TEXT_MESSAGE: &str = "文本";
/// Message types of system notices, excluded from contact ranking.
pub const SYSTEM_MESSAGES: [&str; 2] = ["系统通知", "系统消息"];
/// Fewest received messages for a contact to be ranked.
pub const MIN_CONTACT_MESSAGES: i64 = 10;

const NO_DATA: &str = "No data available.";

/// Textual report plus optional base64 PNG word cloud.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub text: String,
    pub wordcloud: Option<String>,
    /// Weights and raw PNG behind `wordcloud`, for local export.
    #[serde(skip)]
    pub cloud: Option<Visualization>,
}

impl AnalysisResult {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::with_cloud(text, None)
    }

    pub fn with_cloud(text: impl Into<String>, cloud: Option<Visualization>) -> Self {
        Self {
            text: text.into(),
            wordcloud: cloud.as_ref().and_then(Visualization::png_base64),
            cloud,
        }
    }
}

/// One selectable group conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupEntry {
    pub room_name: String,
    /// Display name with the date of the last message, e.g. `Family (2024-05-01)`.
    pub nickname: String,
}

/// Opens an export read-only and checks that it has the expected tables and columns.
pub fn open_export(path: &Path) -> Result<Connection> {
    if path.extension().and_then(|e| e.to_str()) != Some("db") {
        return Err(AnalysisError::NotADatabaseFile(path.display().to_string()));
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    verify_schema(&conn)?;
    Ok(conn)
}

fn verify_schema(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('WL_MSG', 'Contact')",
    )?;
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    if !(tables.iter().any(|t| t == "WL_MSG") && tables.iter().any(|t| t == "Contact")) {
        return Err(AnalysisError::MissingTables);
    }
    // preparing fails on missing columns
    conn.prepare("SELECT room_name, talker, type_name, content FROM WL_MSG LIMIT 1")?;
    conn.prepare("SELECT UserName, NickName, Remark FROM Contact LIMIT 1")?;
    Ok(())
}

fn format_day(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|ts| Local.timestamp_opt(ts, 0).single())
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Group conversations, most recently active first.
pub fn list_groups(conn: &Connection) -> Result<Vec<GroupEntry>> {
    let mut stmt = conn.prepare(
        "SELECT m.room_name,
                CASE WHEN c.NickName IS NULL OR c.NickName = '' THEN m.room_name
                     ELSE c.NickName END AS display_name,
                MAX(m.CreateTime) AS last_msg_time
         FROM WL_MSG m
         LEFT JOIN Contact c ON m.room_name = c.UserName
         WHERE m.room_name LIKE '%chatroom%'
         GROUP BY m.room_name
         ORDER BY last_msg_time DESC",
    )?;
    let groups: Vec<GroupEntry> = stmt
        .query_map([], |row| {
            let room_name: String = row.get(0)?;
            let display: String = row.get(1)?;
            let last: Option<i64> = row.get(2)?;
            Ok(GroupEntry {
                room_name,
                nickname: format!("{display} ({})", format_day(last)),
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    if groups.is_empty() {
        return Err(AnalysisError::NoGroups);
    }
    info!("Found {} group chats", groups.len());
    Ok(groups)
}

struct Contact {
    name: String,
    user_id: String,
    active_days: i64,
}

fn best_contact(conn: &Connection) -> Result<Option<Contact>> {
    let contact = conn
        .query_row(
            "SELECT COALESCE(c.NickName, c.Remark, m.talker) AS name,
                    m.talker AS user_id,
                    COUNT(*) AS msg_count,
                    SUM(LENGTH(m.content)) AS content_length,
                    COUNT(DISTINCT date(m.CreateTime, 'unixepoch')) AS active_days
             FROM WL_MSG m
             LEFT JOIN Contact c ON m.talker = c.UserName
             WHERE m.room_name NOT LIKE '%chatroom%'
               AND m.type_name NOT IN (?1, ?2)
               AND m.Is_sender = 0
               AND m.talker != ''
             GROUP BY m.talker
             HAVING msg_count >= ?3
             ORDER BY (msg_count * 0.4 + COALESCE(content_length, 0) * 0.3 + active_days * 0.3) DESC
             LIMIT 1",
            params![SYSTEM_MESSAGES[0], SYSTEM_MESSAGES[1], MIN_CONTACT_MESSAGES],
            |row| {
                Ok(Contact {
                    name: row.get(0)?,
                    user_id: row.get(1)?,
                    active_days: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(contact)
}

/// Text message bodies matching `filter`, JSON-wrapped messages unwrapped.
fn text_messages(conn: &Connection, filter: &str, id: &str) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT content FROM WL_MSG
         WHERE ({filter}) AND type_name = ?2 AND content IS NOT NULL AND content != ''"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<String> = stmt
        .query_map(params![id, TEXT_MESSAGE], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(rows
        .iter()
        .map(|c| extract_message_text(c).into_owned())
        .collect())
}

/// Report on the contact the user talks to most, with a word cloud of the conversation.
///
/// Contacts are ranked by `0.4 * messages + 0.3 * characters + 0.3 * active days`
/// over received one-to-one messages.
pub fn closest_contact<R: Renderer>(
    conn: &Connection,
    pipeline: &CloudPipeline<R>,
) -> Result<AnalysisResult> {
    let Some(contact) = best_contact(conn)? else {
        info!("No contact with at least {MIN_CONTACT_MESSAGES} messages");
        return Ok(AnalysisResult::text_only(NO_DATA));
    };
    debug!("Closest contact: {}", contact.user_id);

    const CONVERSATION: &str = "talker = ?1 OR (room_name = ?1 AND Is_sender = 1)";
    let (received, sent): (Option<i64>, Option<i64>) = conn.query_row(
        &format!(
            "SELECT SUM(CASE WHEN Is_sender = 0 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN Is_sender = 1 THEN 1 ELSE 0 END)
             FROM WL_MSG
             WHERE ({CONVERSATION}) AND type_name = ?2 AND content != ''"
        ),
        params![contact.user_id, TEXT_MESSAGE],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let (received, sent) = (received.unwrap_or(0), sent.unwrap_or(0));
    let total = received + sent;
    let per_day = if contact.active_days > 0 {
        (total as f64 / contact.active_days as f64 * 10.0).round() / 10.0
    } else {
        0.0
    };

    let text = format!(
        "Your closest contact is [{}]\n\
         You talked on {} days\n\
         Received {received} messages\n\
         Sent {sent} messages\n\
         {total} messages in total\n\
         {per_day:.1} messages per day\n",
        contact.name, contact.active_days
    );

    let messages = text_messages(conn, CONVERSATION, &contact.user_id)?;
    let cloud = pipeline.visualize(&messages.join("\n"));
    Ok(AnalysisResult::with_cloud(text, cloud))
}

/// Report on one group conversation, with a word cloud of its text messages.
pub fn group_activity<R: Renderer>(
    conn: &Connection,
    group_id: &str,
    pipeline: &CloudPipeline<R>,
) -> Result<AnalysisResult> {
    let group_name: Option<String> = conn
        .query_row(
            "SELECT COALESCE(c.NickName, c.Remark, m.room_name)
             FROM WL_MSG m
             LEFT JOIN Contact c ON m.room_name = c.UserName
             WHERE m.room_name = ?1 AND m.type_name = ?2
               AND m.content IS NOT NULL AND m.content != ''
             LIMIT 1",
            params![group_id, TEXT_MESSAGE],
            |row| row.get(0),
        )
        .optional()?;
    let Some(group_name) = group_name else {
        info!("No text messages in group {group_id}");
        return Ok(AnalysisResult::text_only(NO_DATA));
    };

    let messages = text_messages(conn, "room_name = ?1", group_id)?;
    let text = format!(
        "[{group_name}] has {} message records.\n",
        messages.len()
    );
    let cloud = pipeline.visualize(&messages.join("\n"));
    Ok(AnalysisResult::with_cloud(text, cloud))
}
