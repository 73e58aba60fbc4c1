//! `httplens rules` — list the built-in rule catalog.

use httplens_core::rules::default_rules;

pub fn run() {
    println!("{:<24} {:<22} WEIGHT", "ID", "LABEL");
    for rule in default_rules() {
        println!("{:<24} {:<22} {}", rule.id, rule.label, rule.weight);
    }
}
