//! Email rendering for outbound offers.
//!
//! Templates are compiled into the binary so a deployment never depends on the
//! working directory.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};

const OFFER_TEMPLATE_NAME: &str = "email/offer.html";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OfferEmailContext {
    pub customer_name: String,
    pub vehicle_name: String,
    pub vin: String,
    pub offer_amount: Decimal,
    pub expiry_date: String,
    pub terms: String,
    pub payment_method: String,
    pub inspection_required: bool,
    pub offer_url: String,
    pub test_mode: bool,
    pub intended_recipient: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

#[derive(Clone, Debug)]
pub struct EmailRenderer {
    tera: Tera,
}

impl EmailRenderer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);
        tera.add_raw_template(
            OFFER_TEMPLATE_NAME,
            include_str!("../../../templates/email/offer.html"),
        )?;
        Ok(Self { tera })
    }

    pub fn render_offer(&self, context: &OfferEmailContext) -> Result<RenderedEmail, tera::Error> {
        let html = self.tera.render(OFFER_TEMPLATE_NAME, &Context::from_serialize(context)?)?;
        let subject = format!("Your CarSellMax offer for your {}", context.vehicle_name);
        Ok(RenderedEmail { subject, html })
    }
}

/// Registers `money`, which renders a number or decimal string as `$12,345.67`.
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
}

fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(raw) => Decimal::from_str(raw)
            .map_err(|e| tera::Error::msg(format!("money filter: invalid amount `{raw}`: {e}")))?,
        tera::Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| tera::Error::msg("money filter: amount is not representable"))?,
        tera::Value::Null => Decimal::ZERO,
        _ => return Err(tera::Error::msg("money filter expects a number or decimal string")),
    };
    Ok(tera::Value::String(format_money(amount)))
}

pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}${grouped}.{cents}", if negative { "-" } else { "" })
}
