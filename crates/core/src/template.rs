//! Message template rendering.
//!
//! Templates use `{{placeholder}}` tokens. Each placeholder name maps to a
//! resolver function in a [`MessageComposer`] registry, so adding a variable
//! means registering one more resolver. Unknown placeholders are left in the
//! output verbatim.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono_tz::Tz;
use regex::{Captures, Regex};

use crate::notification::NotificationType;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Regex pattern matching `{{ placeholder }}` tokens.
pub const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

/// Zone used when an organization has no valid IANA zone configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

/// Built-in confirmation text, used when a rule has no template of its own.
pub const DEFAULT_CONFIRMATION_TEMPLATE: &str = "Olá {{client_name}}! Seu horário de \
{{service_name}} com {{professional_name}} está marcado para {{appointment_date}} às \
{{appointment_time}} na {{business_name}}. Responda SIM para confirmar ou NÃO para cancelar.";

/// Built-in reminder text, used when a rule has no template of its own.
pub const DEFAULT_REMINDER_TEMPLATE: &str = "Olá {{client_name}}, passando para lembrar do seu \
horário de {{service_name}} em {{appointment_date}} às {{appointment_time}} na \
{{business_name}}, {{address}}. Até logo!";

// ---------------------------------------------------------------------------
// TemplateContext
// ---------------------------------------------------------------------------

/// Appointment values available to templates.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub client_name: &'a str,
    pub scheduled_at: Timestamp,
    pub timezone: Tz,
    pub service_name: Option<&'a str>,
    pub professional_name: Option<&'a str>,
    pub address: Option<&'a str>,
    pub price_cents: Option<i64>,
    pub business_name: &'a str,
}

/// Parse an IANA zone name, falling back to [`DEFAULT_TIMEZONE`].
pub fn timezone_or_default(name: &str) -> Tz {
    name.parse().unwrap_or(DEFAULT_TIMEZONE)
}

/// Resolves one placeholder against a context.
pub type Resolver = fn(&TemplateContext<'_>) -> String;

fn client_name(ctx: &TemplateContext<'_>) -> String {
    ctx.client_name.to_string()
}

fn appointment_date(ctx: &TemplateContext<'_>) -> String {
    ctx.scheduled_at
        .with_timezone(&ctx.timezone)
        .format("%d/%m/%Y")
        .to_string()
}

fn appointment_time(ctx: &TemplateContext<'_>) -> String {
    ctx.scheduled_at
        .with_timezone(&ctx.timezone)
        .format("%H:%M")
        .to_string()
}

fn service_name(ctx: &TemplateContext<'_>) -> String {
    ctx.service_name.unwrap_or_default().to_string()
}

fn professional_name(ctx: &TemplateContext<'_>) -> String {
    ctx.professional_name.unwrap_or_default().to_string()
}

fn address(ctx: &TemplateContext<'_>) -> String {
    ctx.address.unwrap_or_default().to_string()
}

fn price(ctx: &TemplateContext<'_>) -> String {
    ctx.price_cents.map(format_brl).unwrap_or_default()
}

fn business_name(ctx: &TemplateContext<'_>) -> String {
    ctx.business_name.to_string()
}

/// Format an amount in cents as Brazilian reais, e.g. `R$ 1.234,56`.
pub fn format_brl(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let whole = (abs / 100).to_string();
    let fraction = abs % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{sign}R$ {grouped},{fraction:02}")
}

// ---------------------------------------------------------------------------
// MessageComposer
// ---------------------------------------------------------------------------

/// Renders notification text from a template and an appointment context.
#[derive(Clone)]
pub struct MessageComposer {
    resolvers: HashMap<&'static str, Resolver>,
}

impl MessageComposer {
    /// A composer with no placeholders registered.
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Register (or replace) the resolver for a placeholder name.
    pub fn register(&mut self, name: &'static str, resolver: Resolver) -> &mut Self {
        self.resolvers.insert(name, resolver);
        self
    }

    /// The template used for `kind` when a rule has none configured.
    pub fn default_template(kind: NotificationType) -> &'static str {
        match kind {
            NotificationType::Confirmation => DEFAULT_CONFIRMATION_TEMPLATE,
            NotificationType::Reminder => DEFAULT_REMINDER_TEMPLATE,
        }
    }

    /// Render `template`, or the built-in default for `kind` when the
    /// template is absent or blank.
    pub fn compose(
        &self,
        kind: NotificationType,
        template: Option<&str>,
        ctx: &TemplateContext<'_>,
    ) -> String {
        let template = template
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Self::default_template(kind));
        self.render(template, ctx)
    }

    /// Substitute every known placeholder in `template`.
    pub fn render(&self, template: &str, ctx: &TemplateContext<'_>) -> String {
        PLACEHOLDER_RE
            .replace_all(template, |caps: &Captures<'_>| {
                match self.resolvers.get(&caps[1]) {
                    Some(resolve) => resolve(ctx),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl Default for MessageComposer {
    /// The standard placeholder set.
    fn default() -> Self {
        let mut composer = Self::empty();
        composer
            .register("client_name", client_name)
            .register("appointment_date", appointment_date)
            .register("appointment_time", appointment_time)
            .register("service_name", service_name)
            .register("professional_name", professional_name)
            .register("address", address)
            .register("price", price)
            .register("business_name", business_name);
        composer
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
