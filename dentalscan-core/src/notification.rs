//! Email templates for analysis notifications

use crate::severity::Severity;

const FOOTER_TEXT: &str = "© 2024 Teeth Damage Analysis System. All rights reserved.";

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    pub subject: String,
    pub html: String,
    pub text: String,
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "#10b981",
        Severity::Moderate => "#f59e0b",
        Severity::High => "#ef4444",
    }
}

/// Minimal HTML escaping for interpolated values
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sent to a student once their submission has been analyzed
pub fn analysis_complete(
    recipient_name: Option<&str>,
    analysis_url: &str,
    severity: Severity,
) -> EmailTemplate {
    let name = recipient_name.filter(|n| !n.is_empty()).unwrap_or("there");
    let label = severity.as_str().to_uppercase();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <style>
      body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; }}
      .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
      .header {{ background: linear-gradient(135deg, #c4b5fd 0%, #fbcfe8 50%, #a7f3d0 100%); padding: 30px; text-align: center; border-radius: 8px; }}
      .content {{ padding: 30px; background: #f9fafb; border-radius: 8px; margin-top: 20px; }}
      .severity-badge {{ display: inline-block; padding: 8px 16px; border-radius: 20px; color: white; font-weight: bold; background-color: {color}; }}
      .disclaimer {{ background: #fef3c7; padding: 15px; border-radius: 6px; margin-top: 20px; font-size: 13px; color: #92400e; }}
      .footer {{ text-align: center; color: #999; font-size: 12px; margin-top: 30px; }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="header">
        <h1>Analysis Complete!</h1>
        <p>Your dental image has been analyzed</p>
      </div>
      <div class="content">
        <p>Hi {name},</p>
        <p>Your teeth damage analysis has been completed successfully. Here's a summary of your results:</p>
        <p><strong>Overall Severity:</strong><br><span class="severity-badge">{label}</span></p>
        <p><a href="{url}">View Full Analysis Results</a></p>
        <p>The detailed analysis includes:</p>
        <ul>
          <li>Detected dental issues with confidence scores</li>
          <li>Tooth-specific locations and severity levels</li>
          <li>Personalized care recommendations</li>
        </ul>
        <div class="disclaimer">
          <strong>Important Disclaimer:</strong> {disclaimer}
        </div>
      </div>
      <div class="footer">
        <p>&copy; 2024 Teeth Damage Analysis System. All rights reserved.</p>
        <p>This is an automated message. Please do not reply to this email.</p>
      </div>
    </div>
  </body>
</html>"#,
        color = severity_color(severity),
        name = escape_html(name),
        label = label,
        url = escape_html(analysis_url),
        disclaimer = crate::analysis::DISCLAIMER,
    );

    let text = format!(
        "Analysis Complete!\n\n\
         Hi {name},\n\n\
         Your teeth damage analysis has been completed successfully.\n\n\
         Overall Severity: {label}\n\n\
         View your full analysis results here: {url}\n\n\
         The detailed analysis includes:\n\
         - Detected dental issues with confidence scores\n\
         - Tooth-specific locations and severity levels\n\
         - Personalized care recommendations\n\n\
         IMPORTANT DISCLAIMER: {disclaimer}\n\n\
         ---\n\
         {footer}\n\
         This is an automated message. Please do not reply to this email.\n",
        name = name,
        label = label,
        url = analysis_url,
        disclaimer = crate::analysis::DISCLAIMER,
        footer = FOOTER_TEXT,
    );

    EmailTemplate {
        subject: format!("Your Dental Analysis Results - {} Severity", label),
        html,
        text,
    }
}

/// Sent to admins when a submission comes back with high severity
pub fn critical_finding(
    student_name: &str,
    severity: Severity,
    issue_count: usize,
    admin_url: &str,
) -> EmailTemplate {
    let label = severity.as_str().to_uppercase();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <style>
      body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; }}
      .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
      .alert {{ background: #fee2e2; border-left: 4px solid #ef4444; padding: 20px; border-radius: 6px; }}
      .footer {{ text-align: center; color: #999; font-size: 12px; margin-top: 30px; }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="alert">
        <h2>Critical Finding Alert</h2>
        <p>A student submission has been flagged for review due to critical findings.</p>
        <p>
          <strong>Student:</strong> {student}<br>
          <strong>Severity Level:</strong> {label}<br>
          <strong>Issues Detected:</strong> {count}
        </p>
        <p><a href="{url}">Review in Admin Dashboard</a></p>
      </div>
      <div class="footer">
        <p>&copy; 2024 Teeth Damage Analysis System. All rights reserved.</p>
      </div>
    </div>
  </body>
</html>"#,
        student = escape_html(student_name),
        label = label,
        count = issue_count,
        url = escape_html(admin_url),
    );

    let text = format!(
        "CRITICAL FINDING ALERT\n\n\
         A student submission has been flagged for review due to critical findings.\n\n\
         Student: {student}\n\
         Severity Level: {label}\n\
         Issues Detected: {count}\n\n\
         Review in Admin Dashboard: {url}\n\n\
         ---\n\
         {footer}\n",
        student = student_name,
        label = label,
        count = issue_count,
        url = admin_url,
        footer = FOOTER_TEXT,
    );

    EmailTemplate {
        subject: format!("[ALERT] Critical Finding - {}", student_name),
        html,
        text,
    }
}
