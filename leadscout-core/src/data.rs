use crate::error::Result;
use crate::model::{EmailSource, Lead};
use crate::report::{self, ExportFormat};
use leadscout_scanner::EmailValidator;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

pub struct LeadRepository {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct StoredLead {
    pub id: i64,
    pub run_id: Option<String>,
    pub discovered_at: i64,
    pub lead: Lead,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: String,
    pub query: String,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

const LEAD_COLUMNS: &str =
    "id, run_id, discovered_at, name, title, company, email, email_source, phone, linkedin_url, snippet";

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<StoredLead> {
    let email_source: Option<String> = row.get(7)?;
    Ok(StoredLead {
        id: row.get(0)?,
        run_id: row.get(1)?,
        discovered_at: row.get(2)?,
        lead: Lead {
            name: row.get(3)?,
            title: row.get(4)?,
            company: row.get(5)?,
            email: row.get(6)?,
            email_source: email_source.as_deref().and_then(|s| s.parse::<EmailSource>().ok()),
            phone: row.get(8)?,
            linkedin_url: row.get(9)?,
            snippet: row.get(10)?,
        },
    })
}

impl LeadRepository {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let repo = LeadRepository { conn };
        repo.init_schema()?;
        Ok(repo)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let repo = LeadRepository { conn };
        repo.init_schema()?;
        Ok(repo)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    query TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS leads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT,
    discovered_at INTEGER NOT NULL,

    name TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    company TEXT NOT NULL DEFAULT '',
    email TEXT UNIQUE,        -- lowercased; NULL until discovered
    email_source TEXT CHECK(email_source IS NULL OR email_source IN (
        'snippet', 'enrichment', 'site_crawl', 'secondary_search'
    )),
    phone TEXT,
    linkedin_url TEXT NOT NULL,
    snippet TEXT NOT NULL DEFAULT '',

    FOREIGN KEY(run_id) REFERENCES runs(id) ON DELETE SET NULL
);

-- one placeholder per profile while the address is unknown
CREATE UNIQUE INDEX IF NOT EXISTS idx_leads_unresolved ON leads(linkedin_url) WHERE email IS NULL;
CREATE INDEX IF NOT EXISTS idx_leads_run ON leads(run_id);
CREATE INDEX IF NOT EXISTS idx_leads_company ON leads(company);
            ",
        )?;
        Ok(())
    }

    // Run bookkeeping
    pub fn create_run(&self, query: &str) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO runs (id, start_time, status, query) VALUES (?1, ?2, ?3, ?4)",
            params![&run_id, current_timestamp(), "running", query],
        )?;
        Ok(run_id)
    }

    pub fn complete_run(&self, run_id: &str) -> Result<()> {
        self.finish_run(run_id, "completed")
    }

    pub fn fail_run(&self, run_id: &str) -> Result<()> {
        self.finish_run(run_id, "failed")
    }

    fn finish_run(&self, run_id: &str, status: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1, end_time = ?2 WHERE id = ?3",
            params![status, current_timestamp(), run_id],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, start_time, end_time, status, query FROM runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        start_time: row.get(1)?,
                        end_time: row.get(2)?,
                        status: row.get(3)?,
                        query: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    // First write wins per email. An emailed lead replaces the placeholder row
    // kept for the same profile link while it had no address.
    pub fn upsert(&self, lead: &Lead, run_id: Option<&str>) -> Result<bool> {
        let email = lead
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());

        let tx = self.conn.unchecked_transaction()?;

        if email.is_none() {
            let resolved: Option<i64> = tx
                .query_row(
                    "SELECT id FROM leads WHERE linkedin_url = ?1 AND email IS NOT NULL LIMIT 1",
                    params![&lead.linkedin_url],
                    |row| row.get(0),
                )
                .optional()?;
            if resolved.is_some() {
                return Ok(false);
            }
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO leads (
                run_id, discovered_at, name, title, company, email, email_source,
                phone, linkedin_url, snippet
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                current_timestamp(),
                &lead.name,
                &lead.title,
                &lead.company,
                &email,
                email.as_ref().and(lead.email_source.map(|s| s.as_str())),
                &lead.phone,
                &lead.linkedin_url,
                &lead.snippet,
            ],
        )? > 0;

        if inserted && email.is_some() {
            tx.execute(
                "DELETE FROM leads WHERE email IS NULL AND linkedin_url = ?1",
                params![&lead.linkedin_url],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    pub fn get_by_email(&self, email: &str) -> Result<Option<StoredLead>> {
        let lead = self
            .conn
            .query_row(
                &format!("SELECT {} FROM leads WHERE email = ?1", LEAD_COLUMNS),
                params![email.trim().to_lowercase()],
                lead_from_row,
            )
            .optional()?;
        Ok(lead)
    }

    pub fn stored_leads(&self) -> Result<Vec<StoredLead>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM leads ORDER BY id", LEAD_COLUMNS))?;
        let leads = stmt
            .query_map([], lead_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(leads)
    }

    pub fn all_leads(&self) -> Result<Vec<Lead>> {
        Ok(self.stored_leads()?.into_iter().map(|s| s.lead).collect())
    }

    pub fn leads_for_run(&self, run_id: &str) -> Result<Vec<Lead>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM leads WHERE run_id = ?1 ORDER BY id",
            LEAD_COLUMNS
        ))?;
        let leads = stmt
            .query_map(params![run_id], lead_from_row)?
            .map(|row| row.map(|s| s.lead))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(leads)
    }

    pub fn complete_leads(&self, validator: &EmailValidator) -> Result<Vec<Lead>> {
        Ok(self
            .all_leads()?
            .into_iter()
            .filter(|lead| lead.is_complete(validator))
            .collect())
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn export_all(&self, path: &Path, format: ExportFormat) -> Result<usize> {
        let leads = self.all_leads()?;
        report::write_leads(&leads, path, format)?;
        Ok(leads.len())
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
