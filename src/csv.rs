use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use chrono::NaiveDate;

use crate::config::ConfigValue;
use crate::driver::Op;
use crate::engine::WalletSnapshot;
use crate::{Coins, Valuation};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized op '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },

    #[error("line {line}: invalid {field} '{value}'")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    id: Option<String>,
    link: Option<String>,
    amount: Option<u64>,
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    account: u64,
    balance: u64,
    locked: u64,
    total: u64,
}

fn required<T>(
    field: Option<T>,
    line: usize,
    op: &str,
    name: &'static str,
) -> Result<T, CsvError> {
    field.ok_or_else(|| CsvError::MissingField {
        line,
        op: op.to_string(),
        field: name,
    })
}

fn parse_u64(value: &str, line: usize, field: &'static str) -> Result<u64, CsvError> {
    value.trim().parse().map_err(|_| CsvError::InvalidField {
        line,
        field,
        value: value.to_string(),
    })
}

/// Parse a configuration value descriptor: `amount:20`, `rate:10`,
/// `percentage:5`, `fixed:50` or `role:ambassador`.
fn parse_config_value(value: &str, line: usize) -> Result<ConfigValue, CsvError> {
    let invalid = || CsvError::InvalidField {
        line,
        field: "value",
        value: value.to_string(),
    };
    let (kind, raw) = value.split_once(':').ok_or_else(invalid)?;
    match kind {
        "amount" => Ok(ConfigValue::Amount(Coins::new(parse_u64(
            raw, line, "value",
        )?))),
        "rate" => Ok(ConfigValue::Rate(parse_u64(raw, line, "value")?)),
        "percentage" => Ok(ConfigValue::Valuation(Valuation::Percentage(parse_u64(
            raw, line, "value",
        )?))),
        "fixed" => Ok(ConfigValue::Valuation(Valuation::Fixed(Coins::new(
            parse_u64(raw, line, "value")?,
        )))),
        "role" => Ok(ConfigValue::Role(raw.parse().map_err(|_| invalid())?)),
        _ => Err(invalid()),
    }
}

/// Read ledger operations from a csv file
pub fn read_ops(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Op, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_op(row, line)
        })
}

fn parse_op(row: InputRow, line: usize) -> Result<Op, CsvError> {
    let op = row.op.as_str();
    match op {
        "config" => {
            let key = required(row.id, line, op, "key")?;
            let value = required(row.value.as_deref(), line, op, "value")?;
            Ok(Op::Config {
                key,
                value: parse_config_value(value, line)?,
            })
        }
        "enroll" => {
            let account = required(row.id.as_deref(), line, op, "id")?;
            let upline = match row.link.as_deref() {
                Some(link) => Some(parse_u64(link, line, "link")?),
                None => None,
            };
            Ok(Op::Enroll {
                account: parse_u64(account, line, "id")?,
                upline,
            })
        }
        "role" => {
            let account = required(row.id.as_deref(), line, op, "id")?;
            let value = required(row.value.as_deref(), line, op, "value")?;
            let role = value.parse().map_err(|_| CsvError::InvalidField {
                line,
                field: "value",
                value: value.to_string(),
            })?;
            Ok(Op::Role {
                account: parse_u64(account, line, "id")?,
                role,
            })
        }
        "credit" | "debit" | "withdraw" => {
            let account = required(row.id.as_deref(), line, op, "id")?;
            let account = parse_u64(account, line, "id")?;
            let amount = Coins::new(required(row.amount, line, op, "amount")?);
            Ok(match op {
                "credit" => Op::Credit { account, amount },
                "debit" => Op::Debit { account, amount },
                _ => Op::Withdraw { account, amount },
            })
        }
        "approve" => {
            let account = required(row.id.as_deref(), line, op, "id")?;
            Ok(Op::Approve {
                account: parse_u64(account, line, "id")?,
                amount: row.amount.map(Coins::new),
            })
        }
        "reject" => {
            let account = required(row.id.as_deref(), line, op, "id")?;
            Ok(Op::Reject {
                account: parse_u64(account, line, "id")?,
            })
        }
        "lead" => {
            let lead = required(row.id.as_deref(), line, op, "id")?;
            let referrer = required(row.link.as_deref(), line, op, "link")?;
            Ok(Op::Lead {
                lead: parse_u64(lead, line, "id")?,
                referrer: parse_u64(referrer, line, "link")?,
            })
        }
        "convert" => {
            let lead = required(row.id.as_deref(), line, op, "id")?;
            let product = required(row.link.as_deref(), line, op, "link")?;
            let sale_amount = Coins::new(required(row.amount, line, op, "amount")?);
            let policy = required(row.value.as_deref(), line, op, "value")?;
            let immediate = match policy {
                "immediate" => true,
                "deferred" => false,
                other => {
                    return Err(CsvError::InvalidField {
                        line,
                        field: "value",
                        value: other.to_string(),
                    });
                }
            };
            Ok(Op::Convert {
                lead: parse_u64(lead, line, "id")?,
                product: parse_u64(product, line, "link")?,
                sale_amount,
                immediate,
            })
        }
        "sweep" => {
            let value = required(row.value.as_deref(), line, op, "value")?;
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                CsvError::InvalidField {
                    line,
                    field: "value",
                    value: value.to_string(),
                }
            })?;
            Ok(Op::Sweep { date })
        }
        other => Err(CsvError::UnrecognizedOp {
            line,
            op: other.to_string(),
        }),
    }
}

/// write wallet balances to stdout in csv format
pub fn write_accounts(rows: impl IntoIterator<Item = WalletSnapshot>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for snapshot in rows {
        let row = OutputRow {
            account: snapshot.account,
            balance: snapshot.balance.get(),
            locked: snapshot.locked.get(),
            total: snapshot.total.get(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
