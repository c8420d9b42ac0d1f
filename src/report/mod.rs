//! Candidate report rendering and mail delivery.
//!
//! Renders the ranked candidate table as a self-contained HTML document and
//! ships it over SMTP. The renderer must not reorder or rescore rows; it is
//! a pure view of what the engine produced.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fmt::Write as FmtWrite;
use tracing::info;

use crate::config::MailConfig;
use crate::scanner::Candidate;

/// Rationale bullets included below the table.
const RATIONALE_ROWS: usize = 10;

// ============================================================================
// HTML Rendering
// ============================================================================

/// Format a large quantity with thousands separators, rounded to units.
fn format_thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (pos, ch) in digits.chars().enumerate() {
        if pos > 0 && (digits.len() - pos) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Decimal places for price columns: sub-unit prices need more precision.
fn price_digits(price: f64) -> usize {
    if price < 1.0 {
        6
    } else {
        3
    }
}

/// Render the candidate table as an HTML document.
pub fn render_html(rows: &[Candidate], generated_at: DateTime<Utc>) -> String {
    let mut html = String::new();

    let _ = write!(html, "<h2>[perpscan] Candidates: {}</h2>", rows.len());
    let _ = write!(
        html,
        "<div style=\"color:#666;font-family:monospace;font-size:12px\">{}</div><br/>",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    html.push_str(
        "<table border=\"1\" cellpadding=\"6\" cellspacing=\"0\" \
         style=\"border-collapse:collapse;font-family:monospace;font-size:12px\">",
    );
    html.push_str(
        "<tr>\
         <th>Score</th><th>Side</th><th>Symbol</th><th>Pass</th>\
         <th>Entry</th><th>TP</th><th>SL</th>\
         <th>Profit%</th><th>Loss%</th><th>MaxLevSafe</th>\
         <th>BT Win%</th><th>BT N</th><th>BT Half%</th><th>BT MaxCL</th><th>BT Exp</th>\
         <th>Funding%</th><th>OI15m%</th><th>Px15m%</th><th>RSI15</th><th>ATR%</th><th>24h QVol</th>\
         </tr>",
    );

    for r in rows {
        let digits = price_digits(r.price);
        let _ = write!(
            html,
            "<tr>\
             <td><b>{score:.1}</b></td>\
             <td><b>{side}</b></td>\
             <td><b>{symbol}</b></td>\
             <td>{pass}</td>\
             <td>{entry:.digits$}</td>\
             <td>{tp:.digits$}</td>\
             <td>{sl:.digits$}</td>\
             <td>{profit:.2}</td>\
             <td>{loss:.2}</td>\
             <td><b>{lev}x</b></td>\
             <td>{winrate:.1}</td>\
             <td>{trades}</td>\
             <td>{wr_half:.1}</td>\
             <td>{max_cl}</td>\
             <td>{exp:.3}</td>\
             <td>{funding:.3}</td>\
             <td>{oi:.2}</td>\
             <td>{px:.2}</td>\
             <td>{rsi:.1}</td>\
             <td>{atr:.2}</td>\
             <td>{qvol}</td>\
             </tr>",
            score = r.score,
            side = r.side,
            symbol = r.symbol,
            pass = r.pass,
            entry = r.entry,
            tp = r.tp,
            sl = r.sl,
            profit = r.profit_pct,
            loss = r.loss_pct,
            lev = r.max_lev_safe,
            winrate = r.win_rate,
            trades = r.trades,
            wr_half = r.wr_half,
            max_cl = r.max_consec_loss,
            exp = r.expectancy,
            funding = r.funding_pct,
            oi = r.oi_chg_pct,
            px = r.px_chg_pct,
            rsi = r.rsi,
            atr = r.atr_pct,
            qvol = format_thousands(r.qv24),
            digits = digits,
        );
    }

    html.push_str("</table>");

    html.push_str(
        "<br/><div style=\"color:#666;font-family:monospace;font-size:12px\">Why:</div>",
    );
    html.push_str("<ul style=\"font-family:monospace;font-size:12px\">");
    for r in rows.iter().take(RATIONALE_ROWS) {
        let _ = write!(html, "<li><b>{} {}</b> \u{2014} {}</li>", r.symbol, r.side, r.why);
    }
    html.push_str("</ul>");

    html.push_str("<hr/>");
    html.push_str(
        "<div style=\"color:#666;font-family:monospace;font-size:12px\">\
         <b>MaxLevSafe</b> is a conservative ceiling derived from the stop \
         distance, chosen so the estimated liquidation band stays wider than \
         the stop. The real liquidation price depends on maintenance margin, \
         fees, margin mode, position size and mark price; always confirm the \
         exchange's own estimate before entering.\
         </div>",
    );

    html
}

// ============================================================================
// Mail Delivery
// ============================================================================

/// SMTP sink for the candidate report.
pub struct EmailNotifier {
    config: MailConfig,
}

impl EmailNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn create_transport(&self) -> Result<SmtpTransport> {
        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        let transport = SmtpTransport::relay(&self.config.smtp_host)
            .context("SMTP relay setup failed")?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();
        Ok(transport)
    }

    /// Render and send the report. Rows must already be ranked; this layer
    /// never reorders them.
    pub async fn send_report(&self, rows: &[Candidate]) -> Result<()> {
        let generated_at = Utc::now();
        let subject = format!(
            "[perpscan] {} candidates @ {}",
            rows.len(),
            generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let html = render_html(rows, generated_at);

        let from: Mailbox = self.config.from.parse().context("Invalid from address")?;
        let to: Mailbox = self.config.to.parse().context("Invalid recipient address")?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(html)
            .context("Failed to build email")?;

        let transport = self.create_transport()?;
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .context("SMTP send task failed")?
            .context("SMTP send failed")?;

        info!(recipient = %self.config.to, subject = %subject, "Report mailed");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
