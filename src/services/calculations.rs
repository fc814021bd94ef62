// src/services/calculations.rs
use log::warn;

use crate::models::{HistoryMetrics, Snapshot, SnapshotMetrics};
use crate::services::error::ServiceError;

/// Round to two decimal places, halves toward positive infinity. All money
/// math in this module goes through here.
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Valuation metrics for one holding at the current price.
///
/// `gain_loss_percent` is `None` when the investment is zero (quantity 0),
/// so a fresh zero-quantity holding never divides by zero.
pub fn calculate_metrics(
    purchase_price: f64,
    quantity: f64,
    current_price: f64,
) -> Result<SnapshotMetrics, ServiceError> {
    if purchase_price <= 0.0 || quantity < 0.0 || current_price < 0.0 {
        warn!(
            "invalid price or quantity values: purchase={}, qty={}, current={}",
            purchase_price, quantity, current_price
        );
        return Err(ServiceError::InvalidInput(
            "invalid price or quantity values".to_string(),
        ));
    }

    let investment = round2(purchase_price * quantity);
    let present_value = round2(current_price * quantity);
    let gain_loss = round2(present_value - investment);

    let gain_loss_percent = if investment > 0.0 {
        Some(round2(gain_loss / investment * 100.0))
    } else {
        None
    };

    Ok(SnapshotMetrics {
        investment,
        present_value,
        gain_loss,
        gain_loss_percent,
    })
}

/// Percent change between the first and last present value of a period.
/// `None` when the period starts from a zero value.
pub fn calculate_period_return(start_value: f64, end_value: f64) -> Result<Option<f64>, ServiceError> {
    if start_value < 0.0 || end_value < 0.0 {
        return Err(ServiceError::InvalidInput(
            "values cannot be negative".to_string(),
        ));
    }
    if start_value == 0.0 {
        return Ok(None);
    }
    Ok(Some(round2((end_value - start_value) / start_value * 100.0)))
}

/// Summary stats over an ascending run of snapshots.
pub fn history_metrics(history: &[Snapshot]) -> HistoryMetrics {
    let Some(first) = history.first() else {
        return HistoryMetrics {
            period_return: None,
            high_price: None,
            low_price: None,
            best_gain: None,
            worst_gain: None,
            points: 0,
        };
    };
    let last = history.last().unwrap();

    let period_return =
        calculate_period_return(first.present_value, last.present_value).unwrap_or(None);

    let mut high_price = first.current_price;
    let mut low_price = first.current_price;
    let mut best_gain = first.gain_loss_percent.unwrap_or(0.0);
    let mut worst_gain = first.gain_loss_percent.unwrap_or(0.0);

    for record in history {
        if record.current_price > high_price {
            high_price = record.current_price;
        }
        if record.current_price < low_price {
            low_price = record.current_price;
        }
        let gain = record.gain_loss_percent.unwrap_or(0.0);
        if gain > best_gain {
            best_gain = gain;
        }
        if gain < worst_gain {
            worst_gain = gain;
        }
    }

    HistoryMetrics {
        period_return,
        high_price: Some(high_price),
        low_price: Some(low_price),
        best_gain: Some(best_gain),
        worst_gain: Some(worst_gain),
        points: history.len(),
    }
}
