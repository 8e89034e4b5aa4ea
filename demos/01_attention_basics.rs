//! Scaled Dot-Product Attention Walkthrough
//!
//! This example builds queries, keys, and values by hand and walks
//! through the attention computation step by step:
//! - similarity scores and why they are scaled by √d_k
//! - softmax normalization (rows sum to 1)
//! - masking a key position and seeing its weight drop to exactly zero
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example 01_attention_basics
//! ```

use horatio::{scaled_dot_product_attention, Tensor};

fn print_weight_rows(weights: &Tensor, k_len: usize) {
    for (i, row) in weights.data.chunks(k_len).enumerate() {
        let formatted: Vec<String> = row.iter().map(|w| format!("{:.3}", w)).collect();
        let sum: f32 = row.iter().sum();
        println!("  query {}: [{}]  (sum = {:.3})", i, formatted.join(", "), sum);
    }
}

fn main() {
    println!("\n{}", "=".repeat(70));
    println!("  Scaled Dot-Product Attention");
    println!("{}", "=".repeat(70));

    // ========== Hand-built inputs ==========
    // One batch, one head, three query positions, three key positions,
    // four features. Query 0 points the same way as key 0, query 1 as
    // key 1, and query 2 is equally far from everything.
    println!("\n{}", "─".repeat(70));
    println!("1. Inputs");
    println!("{}", "─".repeat(70));

    let query = Tensor::new(
        vec![
            1.0, 0.0, 0.0, 0.0, // aligned with key 0
            0.0, 1.0, 0.0, 0.0, // aligned with key 1
            0.5, 0.5, 0.5, 0.5, // no preference
        ],
        vec![1, 1, 3, 4],
    );
    let key = Tensor::new(
        vec![
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
        ],
        vec![1, 1, 3, 4],
    );
    // Values carry a recognizable payload per position.
    let value = Tensor::new(
        vec![
            10.0, 0.0, 0.0, 0.0, //
            0.0, 10.0, 0.0, 0.0, //
            0.0, 0.0, 10.0, 0.0, //
        ],
        vec![1, 1, 3, 4],
    );

    println!("query:  {:?}", query.shape);
    println!("key:    {:?}", key.shape);
    println!("value:  {:?}", value.shape);

    // ========== Unmasked attention ==========
    println!("\n{}", "─".repeat(70));
    println!("2. Attention weights (softmax of Q·Kᵀ / √d_k)");
    println!("{}", "─".repeat(70));

    let (output, weights) =
        scaled_dot_product_attention(&query, &key, &value, None, None).unwrap();

    println!("\nEach row is one query's distribution over the 3 keys:");
    print_weight_rows(&weights, 3);

    println!("\nQuery 0 leans toward key 0, query 1 toward key 1, and");
    println!("query 2 spreads evenly. Every row sums to 1 by construction.");

    println!("\nOutput (weighted mix of the value rows):");
    for row in output.data.chunks(4) {
        println!("  {:?}", row.iter().map(|v| (v * 100.0).round() / 100.0).collect::<Vec<_>>());
    }

    // ========== Masked attention ==========
    println!("\n{}", "─".repeat(70));
    println!("3. Masking key 2");
    println!("{}", "─".repeat(70));

    // Non-zero mask entries are knocked out with -inf before softmax.
    let mask = Tensor::new(
        vec![
            0.0, 0.0, 1.0, //
            0.0, 0.0, 1.0, //
            0.0, 0.0, 1.0, //
        ],
        vec![3, 3],
    );
    let (_, masked_weights) =
        scaled_dot_product_attention(&query, &key, &value, Some(&mask), None).unwrap();

    println!("\nSame queries, with key 2 masked for every query:");
    print_weight_rows(&masked_weights, 3);

    println!("\nThe masked column is exactly 0.0, not merely small, because");
    println!("its score was -inf going into softmax. The surviving weights");
    println!("renormalize so each row still sums to 1.");

    println!("\n{}", "=".repeat(70));
    println!("  Done");
    println!("{}", "=".repeat(70));
}
