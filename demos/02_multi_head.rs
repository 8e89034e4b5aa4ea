//! Multi-Head Attention Walkthrough
//!
//! This example shows what "heads" add on top of scaled dot-product
//! attention:
//! - the divisibility precondition between d_model and n_heads
//! - the split into [batch, heads, seq, head_dim] and back
//! - per-head attention weights for the same input
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example 02_multi_head
//! ```

use horatio::{MultiHeadAttention, Tensor};

fn main() {
    println!("\n{}", "=".repeat(70));
    println!("  Multi-Head Attention");
    println!("{}", "=".repeat(70));

    // ========== The divisibility precondition ==========
    println!("\n{}", "─".repeat(70));
    println!("1. d_model must split evenly across heads");
    println!("{}", "─".repeat(70));

    match MultiHeadAttention::new(10, 3, 0.0) {
        Ok(_) => unreachable!(),
        Err(e) => println!("\nd_model=10, n_heads=3 is rejected up front:\n  {}", e),
    }
    println!("\nd_model=8, n_heads=2 gives head_dim=4 and is accepted.");

    // ========== Forward pass ==========
    println!("\n{}", "─".repeat(70));
    println!("2. Self-attention over a small batch");
    println!("{}", "─".repeat(70));

    let mut mha = MultiHeadAttention::new(8, 2, 0.0).unwrap();
    mha.set_training(false);

    println!(
        "\nparameters: {} (4 projections of 8×8 weights + 8 biases)",
        mha.num_parameters()
    );

    // A varied input so the two heads have something to disagree about.
    let x = Tensor::new(
        (0..2 * 4 * 8).map(|i| ((i * 7 % 13) as f32 - 6.0) * 0.3).collect(),
        vec![2, 4, 8],
    );
    println!("input:   {:?}  (batch, seq, d_model)", x.shape);

    let (output, weights) = mha.forward(&x, &x, &x, None).unwrap();
    println!("output:  {:?}  (same as input)", output.shape);
    println!("weights: {:?}  (batch, heads, query, key)", weights.shape);

    // ========== Per-head weights ==========
    println!("\n{}", "─".repeat(70));
    println!("3. Each head attends differently");
    println!("{}", "─".repeat(70));

    let (q_len, k_len) = (4, 4);
    for head in 0..2 {
        println!("\nhead {} (first sequence):", head);
        let base = head * q_len * k_len;
        for i in 0..q_len {
            let row = &weights.data[base + i * k_len..base + (i + 1) * k_len];
            let formatted: Vec<String> = row.iter().map(|w| format!("{:.3}", w)).collect();
            println!("  query {}: [{}]", i, formatted.join(", "));
        }
    }

    println!("\nBoth heads see the same 8-feature input, but each works in its");
    println!("own learned 4-feature projection, so their weight patterns differ.");
    println!("The output projection mixes the concatenated heads back together.");

    println!("\n{}", "=".repeat(70));
    println!("  Done");
    println!("{}", "=".repeat(70));
}
