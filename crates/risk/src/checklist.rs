//! The PO3 pre-trade checklist.
//!
//! Trading is allowed once every critical item is ticked.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub critical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSection {
    pub id: String,
    pub title: String,
    pub items: Vec<ChecklistItem>,
}

impl ChecklistSection {
    fn new(id: &str, title: &str, items: &[(&str, &str, &str, bool)]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            items: items
                .iter()
                .map(|(id, label, description, critical)| ChecklistItem {
                    id: id.to_string(),
                    label: label.to_string(),
                    description: description.to_string(),
                    completed: false,
                    critical: *critical,
                })
                .collect(),
        }
    }

    pub fn progress(&self) -> Decimal {
        let done = self.items.iter().filter(|i| i.completed).count();
        percent(done, self.items.len())
    }
}

/// Progress figures for the checklist header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistStatus {
    pub total_progress: Decimal,
    pub critical_progress: Decimal,
    pub can_trade: bool,
    pub sections: Vec<SectionProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionProgress {
    pub id: String,
    pub title: String,
    pub progress: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub sections: Vec<ChecklistSection>,
}

impl Default for Checklist {
    fn default() -> Self {
        Self::po3()
    }
}

impl Checklist {
    /// PO3 Institutional Framework v2.
    pub fn po3() -> Self {
        Self {
            sections: vec![
                ChecklistSection::new(
                    "htf-prep",
                    "PRE-MARKET HTF PREP (4H / 1H)",
                    &[
                        ("po3-phase", "Identify PO3 Phase", "Markup / Distribution / Accumulation", true),
                        ("htf-bias", "Define HTF Bias", "Bullish or Bearish only", true),
                        ("htf-zones", "Mark Valid HTF Zones", "OB + Imbalance + Structure Shift", true),
                        ("zone-status", "Check Zone Status", "Fresh / Mitigated / Invalidated", false),
                        ("htf-liquidity", "Look for HTF Liquidity", "Equal highs/lows or major wicks", false),
                        ("external-sweeps", "Mark External Sweeps", "Prior to BOS = trap setup", false),
                        ("red-folders", "Avoid Red Folders", "No FOMC, ECB, NFP trades", true),
                        ("poc-hvn", "Identify session/weekly POC and HVNs", "High Volume Nodes", false),
                        ("lvn-zones", "Mark Low Volume Nodes (LVNs)", "Potential imbalance continuation zones", false),
                        ("poc-alignment", "POC + OB/Imbalance alignment", "Strong magnet zone confirmation", false),
                        ("poc-avoidance", "Price avoids POC post-sweep", "Signal of active distribution/accumulation", false),
                    ],
                ),
                ChecklistSection::new(
                    "midframe",
                    "MIDFRAME ALIGNMENT (15M)",
                    &[
                        ("15m-choch", "Wait for 15M CHoCH", "Align with HTF bias only", true),
                        ("consolidation", "Observe Consolidation", "Signal of liquidity buildup", false),
                        ("15m-bos", "Confirm 15M BOS", "With body close", true),
                        ("15m-ob", "Mark 15M OB + Imbalance", "Must be unmitigated", false),
                        ("trap-signs", "Trap Signs Present?", "EQ highs/lows, sudden spikes, rejection wicks", false),
                        ("entry-poc", "Entry zone near POC", "15M OB should react off POC", false),
                        ("lvn-rejection", "Price rejects LVN into zone", "Confirms fast entry intent", false),
                        ("poc-flip", "POC Flip after sweep", "Re-accumulation or distribution shift", false),
                    ],
                ),
                ChecklistSection::new(
                    "ltf-entry",
                    "LTF ENTRY CONFIRMATION (1M)",
                    &[
                        ("purge", "Wait for Purge", "Sweep of liquidity (EQ or LQ wick)", true),
                        ("bos-post-purge", "Confirm BOS Post-Purge", "BOS candle body close", true),
                        ("entry-ob-fvg", "Identify Entry OB + FVG", "At BOS origin zone", true),
                        ("crt-signal", "CHoCH + BOS?", "CRT signal confirmed", false),
                        ("atr-expansion", "ATR Expansion Present?", "Strong move validates intention", false),
                        ("volume-surge", "Sharp volume surge", "Inside OB or near refined entry", false),
                        ("micro-poc", "Micro POC (1M volume clusters)", "Confirms trap or engineered reversal", false),
                        ("volume-divergence", "Volume divergence check", "Price spikes but volume drops = false move", false),
                    ],
                ),
                ChecklistSection::new(
                    "execution",
                    "TRADE EXECUTION",
                    &[
                        ("limit-order", "Use Limit Order", "Only after confirmation", true),
                        ("sl-logic", "SL = Logical OB Protection", "Just below/above last internal swing", true),
                        ("tp-2r", "TP = 2R Minimum", "Exit at expansion target or key HTF level", true),
                        ("no-scaling", "No Scaling or Chasing", "One shot, one kill", true),
                        ("volume-confluence", "Volume Confluence present", "POC / HVN / LVN alignment", false),
                    ],
                ),
                ChecklistSection::new(
                    "psychology",
                    "PSYCHOLOGY FILTER",
                    &[
                        ("no-red-folders", "No Trading on Red Folders", "FOMC, ECB, NFP etc.", true),
                        ("no-revenge", "No Revenge Trading", "Missed = missed. Move on.", true),
                        ("walk-away-2r", "Walk Away at 2R", "Protect mental capital", true),
                        ("avoid-fomo", "Avoid FOMO", "Trap the market, don't chase it", true),
                    ],
                ),
                ChecklistSection::new(
                    "journal",
                    "JOURNAL POST-TRADE",
                    &[
                        ("journal-po3", "PO3 Phase", "Accumulation / Distribution / Markup", false),
                        ("journal-zone", "Zone Type", "Valid Fresh / Mitigated / Invalid", false),
                        ("journal-entry", "Entry Signal", "CRT / TDT / BOS only", false),
                        ("journal-sweep", "Sweep Logic", "Internal / External / EQ Lows", false),
                        ("journal-sl", "SL Logic", "OB, swing low, structure base", false),
                        ("journal-emotion", "Emotional State", "Calm / Rushed / Greedy", false),
                    ],
                ),
            ],
        }
    }

    /// Flip one item and return its new state.
    pub fn toggle(&mut self, section_id: &str, item_id: &str) -> Result<bool, RiskError> {
        let item = self
            .sections
            .iter_mut()
            .filter(|s| s.id == section_id)
            .flat_map(|s| s.items.iter_mut())
            .find(|i| i.id == item_id)
            .ok_or_else(|| RiskError::UnknownItem {
                section: section_id.to_string(),
                item: item_id.to_string(),
            })?;
        item.completed = !item.completed;
        Ok(item.completed)
    }

    /// Untick everything, ready for the next setup.
    pub fn reset(&mut self) {
        for item in self.sections.iter_mut().flat_map(|s| s.items.iter_mut()) {
            item.completed = false;
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    pub fn total_progress(&self) -> Decimal {
        let done = self.items().filter(|i| i.completed).count();
        percent(done, self.items().count())
    }

    pub fn critical_progress(&self) -> Decimal {
        let critical = self.items().filter(|i| i.critical).count();
        let done = self.items().filter(|i| i.critical && i.completed).count();
        percent(done, critical)
    }

    pub fn section_progress(&self, section_id: &str) -> Option<Decimal> {
        self.sections
            .iter()
            .find(|s| s.id == section_id)
            .map(ChecklistSection::progress)
    }

    pub fn can_trade(&self) -> bool {
        self.items().filter(|i| i.critical).all(|i| i.completed)
    }

    pub fn status(&self) -> ChecklistStatus {
        ChecklistStatus {
            total_progress: self.total_progress(),
            critical_progress: self.critical_progress(),
            can_trade: self.can_trade(),
            sections: self
                .sections
                .iter()
                .map(|s| SectionProgress {
                    id: s.id.clone(),
                    title: s.title.clone(),
                    progress: s.progress(),
                })
                .collect(),
        }
    }
}

fn percent(done: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(done) * dec!(100) / Decimal::from(total)).round_dp(2)
}
