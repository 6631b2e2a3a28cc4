// Lead export and run summaries

use crate::error::Result;
use crate::model::Lead;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

#[derive(Debug, Serialize)]
struct LeadRow<'a> {
    name: &'a str,
    title: &'a str,
    company: &'a str,
    email: &'a str,
    email_source: &'a str,
    phone: &'a str,
    linkedin_url: &'a str,
    snippet: &'a str,
}

impl<'a> From<&'a Lead> for LeadRow<'a> {
    fn from(lead: &'a Lead) -> Self {
        Self {
            name: &lead.name,
            title: &lead.title,
            company: &lead.company,
            email: lead.email.as_deref().unwrap_or(""),
            email_source: lead.email_source.map(|s| s.as_str()).unwrap_or(""),
            phone: lead.phone.as_deref().unwrap_or(""),
            linkedin_url: &lead.linkedin_url,
            snippet: &lead.snippet,
        }
    }
}

pub fn write_csv<W: Write>(leads: &[Lead], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for lead in leads {
        csv.serialize(LeadRow::from(lead))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn generate_json_export(leads: &[Lead]) -> Result<String> {
    let export = serde_json::json!({
        "export": {
            "metadata": {
                "generator": "leadscout",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "total_leads": leads.len(),
            "leads": leads
        }
    });
    Ok(serde_json::to_string_pretty(&export)?)
}

pub fn write_leads(leads: &[Lead], path: &Path, format: ExportFormat) -> Result<()> {
    let file = File::create(path)?;
    match format {
        ExportFormat::Csv => write_csv(leads, file),
        ExportFormat::Json => {
            let mut file = file;
            file.write_all(generate_json_export(leads)?.as_bytes())?;
            Ok(())
        }
    }
}

pub fn generate_lead_report(leads: &[Lead]) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Leads: {}\n", leads.len()));

    let with_email = leads.iter().filter(|l| l.email.is_some()).count();
    report.push_str(&format!("  With email: {}\n", with_email));

    let with_phone = leads.iter().filter(|l| l.phone.is_some()).count();
    report.push_str(&format!("  With phone: {}\n", with_phone));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    let mut by_company: BTreeMap<&str, Vec<&Lead>> = BTreeMap::new();
    for lead in leads {
        let company = if lead.company.is_empty() {
            "(unknown company)"
        } else {
            lead.company.as_str()
        };
        by_company.entry(company).or_default().push(lead);
    }

    for (company, company_leads) in &by_company {
        report.push_str(&format!("## {}\n", company));
        for lead in company_leads {
            let name = if lead.name.is_empty() { "(no name)" } else { &lead.name };
            let mut line = format!("  {}", name);
            if !lead.title.is_empty() {
                line.push_str(&format!(", {}", lead.title));
            }
            match (&lead.email, lead.email_source) {
                (Some(email), Some(source)) => {
                    line.push_str(&format!(" <{}> \x1b[90m{}\x1b[0m", email, source.as_str()))
                }
                (Some(email), None) => line.push_str(&format!(" <{}>", email)),
                (None, _) => line.push_str(" \x1b[33mno email\x1b[0m"),
            }
            report.push_str(&line);
            report.push('\n');
        }
        report.push('\n');
    }

    report
}
