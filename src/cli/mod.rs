use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{LedgerService, NewRecord};
use crate::domain::{
    ClientIdentity, LedgerState, PaymentDraft, PaymentMethod, PaymentPatch, PayrollStatus,
    RecordDetails, RecordKind, RecordStatus, ServiceRecord, format_cents, parse_cents,
};
use crate::io::{Exporter, write_breakdown_csv};
use crate::logging::LogFormat;

/// Receivables - service payment ledger
#[derive(Parser)]
#[command(name = "receivables")]
#[command(about = "Track client service payments and reconcile them into a financial summary")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "RECEIVABLES_DB", default_value = "receivables.db")]
    pub database: String,

    /// Log level or filter directive (e.g. "info", "receivables=debug")
    #[arg(long, env = "RECEIVABLES_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, env = "RECEIVABLES_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Service record management
    #[command(subcommand)]
    Record(RecordCommands),

    /// Payment ledger commands
    #[command(subcommand)]
    Payment(PaymentCommands),

    /// Payroll ledger commands
    #[command(subcommand)]
    Payroll(PayrollCommands),

    /// Processing price catalog commands
    #[command(subcommand)]
    Catalog(CatalogCommands),

    /// Show the financial summary across all records
    Summary {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show every record grouped by kind
    Breakdown {
        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Export reports to a file or stdout
    Export {
        /// What to export: breakdown (csv), report (json)
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Create a new service record
    Create {
        /// Record kind: converted, manual, processing
        kind: String,

        /// Service category (free text, used to group revenue)
        #[arg(short, long)]
        category: String,

        /// Client name
        #[arg(short, long)]
        name: String,

        /// Client phone
        #[arg(long)]
        phone: Option<String>,

        /// Client email
        #[arg(long)]
        email: Option<String>,

        /// Billed total (required unless processing)
        #[arg(short, long)]
        total: Option<String>,

        /// Lead reference for converted records
        #[arg(long)]
        lead_ref: Option<String>,

        /// Catalog service title for processing records
        #[arg(long)]
        service_title: Option<String>,

        /// Initial status: pending, in_progress, completed, cancelled
        #[arg(long, default_value = "pending")]
        status: String,

        /// Amount of an initial payment
        #[arg(long)]
        paid: Option<String>,

        /// Method of the initial payment
        #[arg(long, default_value = "cash")]
        method: String,

        /// Date of the initial payment (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show a record with its ledger
    Show {
        /// Record kind
        kind: String,
        /// Record ID
        id: String,
    },

    /// List records
    List {
        /// Filter by kind
        #[arg(long)]
        kind: Option<String>,
    },

    /// Revise a record's billed total
    SetTotal {
        kind: String,
        id: String,
        /// New total (e.g. "10000" or "10000.00")
        amount: String,
    },

    /// Change a record's status
    SetStatus {
        kind: String,
        id: String,
        /// pending, in_progress, completed, cancelled
        status: String,
    },
}

#[derive(Subcommand)]
pub enum PaymentCommands {
    /// Record a payment against a record
    Add {
        kind: String,
        id: String,
        /// Amount received
        amount: String,

        /// Payment method: cash, cheque, bank, easypaisa, jazzcash
        #[arg(short, long)]
        method: String,

        /// Payment date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,

        /// Account number
        #[arg(long)]
        account: Option<String>,

        /// Payer name
        #[arg(long)]
        payer: Option<String>,

        /// Remarks
        #[arg(long)]
        remarks: Option<String>,
    },

    /// Edit fields of an existing payment
    Edit {
        kind: String,
        id: String,
        /// Payment position (1 = first payment)
        position: usize,

        #[arg(long)]
        amount: Option<String>,

        #[arg(short, long)]
        method: Option<String>,

        #[arg(long)]
        date: Option<String>,

        /// New account number (pass "" to clear)
        #[arg(long)]
        account: Option<String>,

        /// New payer name (pass "" to clear)
        #[arg(long)]
        payer: Option<String>,

        /// New remarks (pass "" to clear)
        #[arg(long)]
        remarks: Option<String>,
    },

    /// Delete a payment
    Delete {
        kind: String,
        id: String,
        /// Payment position (1 = first payment)
        position: usize,
    },

    /// List payments of a record
    List {
        kind: String,
        id: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum PayrollCommands {
    /// Add a payroll entry
    Add {
        /// Employee name
        employee: String,

        /// Salary amount
        salary: String,

        /// Pay period label (e.g. 2024-01)
        #[arg(long)]
        period: String,

        /// Record the entry as already paid
        #[arg(long)]
        paid: bool,

        /// Payment date when --paid (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Mark a pending entry as paid
    Pay {
        /// Payroll entry ID
        id: String,

        /// Payment date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List payroll entries
    List {
        /// Filter by status: pending, paid
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Set the price of a processing service
    Set {
        /// Service title
        title: String,
        /// Price
        price: String,
    },

    /// List catalog prices
    List,
}

impl Cli {
    /// Effective log filter after applying --verbose.
    pub fn log_filter(&self) -> &str {
        if self.verbose { "debug" } else { &self.log_level }
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Record(cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_record_command(&service, cmd).await?;
            }

            Commands::Payment(cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_payment_command(&service, cmd).await?;
            }

            Commands::Payroll(cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_payroll_command(&service, cmd).await?;
            }

            Commands::Catalog(cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_catalog_command(&service, cmd).await?;
            }

            Commands::Summary { format } => {
                let service = LedgerService::connect(&self.database).await?;
                run_summary_command(&service, &format).await?;
            }

            Commands::Breakdown { format } => {
                let service = LedgerService::connect(&self.database).await?;
                run_breakdown_command(&service, &format).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_record_command(service: &LedgerService, cmd: RecordCommands) -> Result<()> {
    match cmd {
        RecordCommands::Create {
            kind,
            category,
            name,
            phone,
            email,
            total,
            lead_ref,
            service_title,
            status,
            paid,
            method,
            date,
        } => {
            let kind = parse_kind(&kind)?;
            let details = match kind {
                RecordKind::Converted => RecordDetails::Converted {
                    lead_reference: lead_ref,
                },
                RecordKind::Manual => RecordDetails::Manual,
                RecordKind::Processing => RecordDetails::Processing {
                    service_title: service_title.unwrap_or_else(|| category.clone()),
                },
            };

            let mut client = ClientIdentity::new(name);
            if let Some(phone) = phone {
                client = client.with_phone(phone);
            }
            if let Some(email) = email {
                client = client.with_email(email);
            }

            let mut new = NewRecord::new(details, category, client).with_status(parse_status(&status)?);
            if let Some(total) = total {
                new = new.with_total(parse_amount(&total)?);
            }
            if let Some(paid) = paid {
                let draft = PaymentDraft::new(
                    parse_amount(&paid)?,
                    parse_date_or_now(date.as_deref())?,
                    parse_method(&method)?,
                );
                new = new.with_initial_payment(draft);
            }

            let record = service.create_record(new).await?;
            println!("Created {} record: {}", record.kind(), record.id);
        }

        RecordCommands::Show { kind, id } => {
            let kind = parse_kind(&kind)?;
            let id = parse_id(&id)?;
            let record = service.get_record(kind, id).await?;
            let state = service.get_payments(kind, id).await?;
            print_record(&record);
            println!();
            print_ledger(&state);
        }

        RecordCommands::List { kind } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let records = service.list_records(kind).await?;

            if records.is_empty() {
                println!("No records found.");
            } else {
                println!(
                    "{:<36} {:<10} {:<20} {:<20} {:>12} {:>12}",
                    "ID", "KIND", "CATEGORY", "CLIENT", "TOTAL", "REMAINING"
                );
                println!("{}", "-".repeat(115));
                for record in records {
                    let (total, remaining) = match &record.pricing {
                        Some(p) => (format_cents(p.total_payment), format_cents(p.remaining_amount)),
                        None => ("catalog".to_string(), "-".to_string()),
                    };
                    println!(
                        "{:<36} {:<10} {:<20} {:<20} {:>12} {:>12}",
                        record.id,
                        record.kind(),
                        truncate(&record.service_category, 20),
                        truncate(&record.client.name, 20),
                        total,
                        remaining
                    );
                }
            }
        }

        RecordCommands::SetTotal { kind, id, amount } => {
            let state = service
                .update_total_payment(parse_kind(&kind)?, parse_id(&id)?, parse_amount(&amount)?)
                .await?;
            print_ledger(&state);
        }

        RecordCommands::SetStatus { kind, id, status } => {
            let record = service
                .update_status(parse_kind(&kind)?, parse_id(&id)?, parse_status(&status)?)
                .await?;
            println!("Record {} is now {}", record.id, record.status);
        }
    }

    Ok(())
}

async fn run_payment_command(service: &LedgerService, cmd: PaymentCommands) -> Result<()> {
    match cmd {
        PaymentCommands::Add {
            kind,
            id,
            amount,
            method,
            date,
            account,
            payer,
            remarks,
        } => {
            let draft = PaymentDraft {
                amount: parse_amount(&amount)?,
                date: Some(parse_date_or_now(date.as_deref())?),
                method: Some(parse_method(&method)?),
                account_number: account,
                payer_name: payer,
                remarks,
            };
            let state = service
                .add_payment(parse_kind(&kind)?, parse_id(&id)?, draft)
                .await?;
            print_ledger(&state);
        }

        PaymentCommands::Edit {
            kind,
            id,
            position,
            amount,
            method,
            date,
            account,
            payer,
            remarks,
        } => {
            let patch = PaymentPatch {
                amount: amount.as_deref().map(parse_amount).transpose()?,
                date: date.as_deref().map(parse_date).transpose()?,
                method: method.as_deref().map(parse_method).transpose()?,
                account_number: account.map(clearable),
                payer_name: payer.map(clearable),
                remarks: remarks.map(clearable),
            };
            let state = service
                .edit_payment(
                    parse_kind(&kind)?,
                    parse_id(&id)?,
                    position_to_index(position)?,
                    patch,
                )
                .await?;
            print_ledger(&state);
        }

        PaymentCommands::Delete { kind, id, position } => {
            let state = service
                .delete_payment(parse_kind(&kind)?, parse_id(&id)?, position_to_index(position)?)
                .await?;
            print_ledger(&state);
        }

        PaymentCommands::List { kind, id, format } => {
            let state = service.get_payments(parse_kind(&kind)?, parse_id(&id)?).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&state)?),
                _ => print_ledger(&state),
            }
        }
    }

    Ok(())
}

async fn run_payroll_command(service: &LedgerService, cmd: PayrollCommands) -> Result<()> {
    match cmd {
        PayrollCommands::Add {
            employee,
            salary,
            period,
            paid,
            date,
        } => {
            let paid_at = if paid {
                Some(parse_date_or_now(date.as_deref())?)
            } else {
                None
            };
            let entry = service
                .add_payroll_entry(employee, parse_amount(&salary)?, period, paid_at)
                .await?;
            println!(
                "Added payroll entry: {} {} ({}) {}",
                entry.employee_name,
                format_cents(entry.salary),
                entry.status,
                entry.id
            );
        }

        PayrollCommands::Pay { id, date } => {
            let id = Uuid::parse_str(&id).context("Invalid payroll ID format (expected UUID)")?;
            service
                .mark_payroll_paid(id, parse_date_or_now(date.as_deref())?)
                .await?;
            println!("Marked payroll entry {} as paid", id);
        }

        PayrollCommands::List { status } => {
            let status = status
                .as_deref()
                .map(|s| {
                    PayrollStatus::from_str(s)
                        .ok_or_else(|| anyhow::anyhow!("Invalid payroll status '{}'", s))
                })
                .transpose()?;
            let entries = service.list_payroll(status).await?;

            if entries.is_empty() {
                println!("No payroll entries found.");
            } else {
                println!(
                    "{:<36} {:<20} {:<10} {:>12} {:<8} {:<10}",
                    "ID", "EMPLOYEE", "PERIOD", "SALARY", "STATUS", "PAID"
                );
                println!("{}", "-".repeat(101));
                for entry in entries {
                    println!(
                        "{:<36} {:<20} {:<10} {:>12} {:<8} {:<10}",
                        entry.id,
                        truncate(&entry.employee_name, 20),
                        entry.period,
                        format_cents(entry.salary),
                        entry.status,
                        entry
                            .paid_at
                            .map(|d| d.format("%Y-%m-%d").to_string())
                            .unwrap_or_default()
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_catalog_command(service: &LedgerService, cmd: CatalogCommands) -> Result<()> {
    match cmd {
        CatalogCommands::Set { title, price } => {
            let price = parse_amount(&price)?;
            service.set_catalog_price(&title, price).await?;
            println!("Catalog price for '{}': {}", title, format_cents(price));
        }

        CatalogCommands::List => {
            let catalog = service.list_catalog().await?;
            if catalog.is_empty() {
                println!("Catalog is empty.");
            } else {
                println!("{:<40} {:>12}", "SERVICE", "PRICE");
                println!("{}", "-".repeat(53));
                for (title, price) in catalog {
                    println!("{:<40} {:>12}", truncate(&title, 40), format_cents(price));
                }
            }
        }
    }

    Ok(())
}

async fn run_summary_command(service: &LedgerService, format: &str) -> Result<()> {
    let summary = service.reports().compute_summary().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => {
            println!("Financial Summary ({} records)", summary.record_count);
            println!();
            println!("Total Revenue:   {:>15}", format_cents(summary.total_revenue));
            println!("Total Received:  {:>15}", format_cents(summary.total_received));
            println!("Total Pending:   {:>15}", format_cents(summary.total_pending));
            println!("Salary Paid:     {:>15}", format_cents(summary.salary_paid));
            println!("{}", "-".repeat(32));
            println!("Total Profit:    {:>15}", format_cents(summary.total_profit));

            if !summary.revenue_by_service.is_empty() {
                println!();
                println!("Revenue by Service:");
                for (category, total) in &summary.revenue_by_service {
                    println!("  {:<28} {:>15}", truncate(category, 28), format_cents(*total));
                }
            }

            if !summary.latest_payrolls.is_empty() {
                println!();
                println!("Latest Payrolls:");
                for entry in &summary.latest_payrolls {
                    println!(
                        "  {:<20} {:<10} {:>12}",
                        truncate(&entry.employee_name, 20),
                        entry.period,
                        format_cents(entry.salary)
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_breakdown_command(service: &LedgerService, format: &str) -> Result<()> {
    let breakdown = service.reports().compute_service_breakdown().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&breakdown)?),
        "csv" => {
            write_breakdown_csv(&breakdown, io::stdout())?;
        }
        _ => {
            for kind in RecordKind::ALL {
                let rows = breakdown.bucket(kind);
                println!("{} ({})", kind, rows.len());
                if rows.is_empty() {
                    println!();
                    continue;
                }
                println!(
                    "  {:<20} {:<20} {:>12} {:>12} {:>12} {:<10}",
                    "CATEGORY", "CLIENT", "TOTAL", "RECEIVED", "REMAINING", "METHOD"
                );
                for row in rows {
                    println!(
                        "  {:<20} {:<20} {:>12} {:>12} {:>12} {:<10}",
                        truncate(&row.service_category, 20),
                        truncate(&row.name, 20),
                        format_cents(row.total_payment),
                        format_cents(row.current_receiving_payment),
                        format_cents(row.remaining_amount),
                        row.payment_method.map(|m| m.as_str()).unwrap_or("-")
                    );
                }
                println!();
            }
        }
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create file: {}", path))?,
        ),
        None => Box::new(io::stdout()),
    };

    let exporter = Exporter::new(service);
    match export_type {
        "breakdown" => {
            let count = exporter.export_breakdown_csv(writer).await?;
            eprintln!("Exported {} records", count);
        }
        "report" => {
            exporter.export_report_json(writer).await?;
            eprintln!("Exported report");
        }
        _ => {
            anyhow::bail!(
                "Unknown export type '{}'. Valid types: breakdown, report",
                export_type
            );
        }
    }

    Ok(())
}

fn print_record(record: &ServiceRecord) {
    println!("Record: {}", record.id);
    println!("  Kind:           {}", record.kind());
    println!("  Category:       {}", record.service_category);
    println!("  Client:         {}", record.client.name);
    if let Some(phone) = &record.client.phone {
        println!("  Phone:          {}", phone);
    }
    if let Some(email) = &record.client.email {
        println!("  Email:          {}", email);
    }
    match &record.details {
        RecordDetails::Converted {
            lead_reference: Some(lead),
        } => println!("  Lead:           {}", lead),
        RecordDetails::Processing { service_title } => {
            println!("  Service title:  {}", service_title)
        }
        _ => {}
    }
    println!("  Status:         {}", record.status);
    println!(
        "  Created:        {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_ledger(state: &LedgerState) {
    let pricing = &state.pricing;
    println!("Total:     {:>15}", format_cents(pricing.total_payment));
    println!(
        "Received:  {:>15}",
        format_cents(pricing.current_receiving_payment)
    );
    println!("Remaining: {:>15}", format_cents(pricing.remaining_amount));

    if state.payments.is_empty() {
        println!();
        println!("No payments recorded.");
        return;
    }

    println!();
    println!(
        "{:<4} {:<16} {:<12} {:>12} {:<10} {:<20}",
        "#", "LABEL", "DATE", "AMOUNT", "METHOD", "PAYER"
    );
    println!("{}", "-".repeat(79));
    for (i, payment) in state.payments.iter().enumerate() {
        println!(
            "{:<4} {:<16} {:<12} {:>12} {:<10} {:<20}",
            i + 1,
            payment.label,
            payment.date.format("%Y-%m-%d"),
            format_cents(payment.amount),
            payment.method,
            payment.payer_name.as_deref().unwrap_or("")
        );
    }
}

fn parse_kind(s: &str) -> Result<RecordKind> {
    RecordKind::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid record kind '{}'. Valid: converted, manual, processing",
            s
        )
    })
}

fn parse_status(s: &str) -> Result<RecordStatus> {
    RecordStatus::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid status '{}'. Valid: pending, in_progress, completed, cancelled",
            s
        )
    })
}

fn parse_method(s: &str) -> Result<PaymentMethod> {
    PaymentMethod::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid payment method '{}'. Valid: cash, cheque, bank, easypaisa, jazzcash",
            s
        )
    })
}

fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).context("Invalid record ID format (expected UUID)")
}

fn parse_amount(s: &str) -> Result<i64> {
    parse_cents(s).with_context(|| format!("Invalid amount '{}'. Use '4000' or '4000.50'", s))
}

fn position_to_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("Payment positions start at 1"))
}

fn parse_date_or_now(date: Option<&str>) -> Result<DateTime<Utc>> {
    match date {
        Some(date_str) => parse_date(date_str),
        None => Ok(Utc::now()),
    }
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    use chrono::NaiveDate;

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", date_str))?;

    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(DateTime::from_naive_utc_and_offset(naive_datetime, Utc))
}

/// An empty edit value clears the field.
fn clearable(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
