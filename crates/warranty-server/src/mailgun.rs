//! [`Notifier`] backed by the Mailgun HTTP API.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use warranty_core::{Confirmation, Notifier};

fn default_api_base() -> String { "https://api.mailgun.net".to_string() }

fn default_subject() -> String {
  "{patient_surname} 您的植入物保固已完成登錄".to_string()
}

/// `[mailgun]` table of the server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailgunConfig {
  pub domain:                     String,
  pub api_key:                    String,
  pub from_email:                 String,
  pub sender_name:                String,
  /// Supports `{patient_name}`, `{patient_surname}` and `{company_name}`.
  #[serde(default = "default_subject")]
  pub subject_template:           String,
  pub company_name:               String,
  #[serde(default)]
  pub company_notification_email: Option<String>,
  #[serde(default = "default_api_base")]
  pub api_base:                   String,
}

#[derive(Debug, Error)]
pub enum MailError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("mailgun rejected the message ({status}): {body}")]
  Rejected { status: StatusCode, body: String },
}

/// Sends confirmation and company notices through Mailgun.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct MailgunNotifier {
  client: Client,
  config: MailgunConfig,
}

impl MailgunNotifier {
  pub fn new(config: MailgunConfig) -> Result<Self, MailError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  pub fn subject(&self, c: &Confirmation) -> String {
    self
      .config
      .subject_template
      .replace("{patient_surname}", c.surname())
      .replace("{patient_name}", &c.patient_name)
      .replace("{company_name}", &self.config.company_name)
  }

  pub fn confirmation_text(&self, c: &Confirmation) -> String {
    let mut out = format!("親愛的 {} 您好，\n\n", c.patient_name);
    out.push_str("您的植入物保固登記已完成，以下是您的保固資訊：\n\n");
    out.push_str(&self.details(c));
    out.push_str("\n請妥善保存此信件作為保固憑證。\n");
    out.push_str("如有任何術後問題，請聯繫您的手術醫院。\n");
    out.push_str(&format!("\n此致\n{}\n", self.config.company_name));
    out
  }

  fn company_text(&self, c: &Confirmation) -> String {
    let mut out = String::from("新的保固登記已完成：\n\n");
    out.push_str(&format!("病患姓名：{}\n", c.patient_name));
    out.push_str(&format!("電子郵件：{}\n", c.patient_email));
    out.push_str(&self.details(c));
    out
  }

  fn details(&self, c: &Confirmation) -> String {
    let mut out = String::from("=== 保固資訊 ===\n");
    out.push_str(&format!("登記編號：{}\n", c.warranty_id));
    if let Some(p) = &c.product {
      out.push_str(&format!("產品品牌：{}\n", p.brand));
      out.push_str(&format!("產品型號：{}\n", p.model_number));
      out.push_str(&format!("產品尺寸：{}\n", p.size.as_deref().unwrap_or("")));
      out.push_str(&format!("產品類型：{}\n", p.kind));
    }
    out.push_str(&format!("序號：{}\n", c.serial_number));
    if let Some(s) = &c.serial_number_2 {
      out.push_str(&format!("第二序號：{s}\n"));
    }
    out.push_str(&format!("手術日期：{}\n", zh_date(c.surgery_date)));
    let end = if c.is_lifetime() {
      "終身保固".to_string()
    } else {
      zh_date(c.warranty_end_date)
    };
    out.push_str(&format!("保固期限：{end}\n"));
    out.push_str(&format!(
      "手術醫院：{}\n",
      c.hospital_name.as_deref().unwrap_or("")
    ));
    out.push_str(&format!("主治醫師：{}\n", c.doctor_name.as_deref().unwrap_or("")));
    out
  }

  async fn send(
    &self,
    to: &str,
    subject: String,
    text: String,
    tag: &str,
    c: &Confirmation,
  ) -> Result<(), MailError> {
    let url = format!(
      "{}/v3/{}/messages",
      self.config.api_base.trim_end_matches('/'),
      self.config.domain
    );
    let from = format!("{} <{}>", self.config.sender_name, self.config.from_email);
    let form = [
      ("from", from),
      ("to", to.to_owned()),
      ("subject", subject),
      ("text", text),
      ("o:tag", tag.to_owned()),
      ("o:tag", "automated".to_owned()),
      ("v:warranty_id", c.warranty_id.to_string()),
    ];

    let resp = self
      .client
      .post(url)
      .basic_auth("api", Some(&self.config.api_key))
      .form(&form)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(MailError::Rejected { status, body });
    }
    tracing::info!(warranty_id = %c.warranty_id, tag, "mail accepted by mailgun");
    Ok(())
  }
}

fn zh_date(d: Option<NaiveDate>) -> String {
  d.map(|d| d.format("%Y年%m月%d日").to_string()).unwrap_or_default()
}

impl Notifier for MailgunNotifier {
  type Error = MailError;

  async fn send_confirmation(&self, c: &Confirmation) -> Result<(), MailError> {
    let subject = self.subject(c);
    let text = self.confirmation_text(c);
    self
      .send(&c.patient_email, subject, text, "warranty-confirmation", c)
      .await
  }

  async fn notify_company(&self, c: &Confirmation) -> Result<(), MailError> {
    let Some(to) = self.config.company_notification_email.as_deref() else {
      tracing::warn!("company notification email not configured; skipping");
      return Ok(());
    };
    let subject = format!("新保固登記通知 - {}", c.patient_name);
    let text = self.company_text(c);
    self.send(to, subject, text, "company-notification", c).await
  }
}
