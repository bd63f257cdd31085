//! Integration tests for Gpt2Attention.

use std::collections::HashMap;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use speculative_sampling::model::attention::causal_mask;
use speculative_sampling::model::Gpt2Attention;

fn test_device() -> Device {
    Device::Cpu
}

fn attention_weights(hidden_size: usize, device: &Device) -> HashMap<String, Tensor> {
    let mut tensors = HashMap::new();
    tensors.insert(
        "c_attn.weight".to_string(),
        Tensor::randn(0f32, 0.2, (hidden_size, 3 * hidden_size), device).unwrap(),
    );
    tensors.insert(
        "c_attn.bias".to_string(),
        Tensor::zeros(3 * hidden_size, DType::F32, device).unwrap(),
    );
    tensors.insert(
        "c_proj.weight".to_string(),
        Tensor::randn(0f32, 0.2, (hidden_size, hidden_size), device).unwrap(),
    );
    tensors.insert(
        "c_proj.bias".to_string(),
        Tensor::zeros(hidden_size, DType::F32, device).unwrap(),
    );
    tensors
}

fn create_attention(hidden_size: usize, num_heads: usize) -> Gpt2Attention {
    let device = test_device();
    let vb = VarBuilder::from_tensors(attention_weights(hidden_size, &device), DType::F32, &device);
    Gpt2Attention::new(hidden_size, num_heads, vb).unwrap()
}

#[test]
fn test_attention_creation() {
    let attn = create_attention(32, 4);

    assert_eq!(attn.num_heads(), 4);
    assert_eq!(attn.head_dim(), 8);
}

#[test]
fn test_attention_rejects_uneven_heads() {
    let device = test_device();
    let vb = VarBuilder::from_tensors(attention_weights(30, &device), DType::F32, &device);

    assert!(Gpt2Attention::new(30, 4, vb).is_err());
}

#[test]
fn test_attention_forward_shape() {
    let device = test_device();
    let attn = create_attention(32, 4);

    let hidden = Tensor::randn(0f32, 1.0, (2, 5, 32), &device).unwrap();
    let mask = causal_mask(5, &device).unwrap();
    let output = attn.forward(&hidden, &mask).unwrap();

    assert_eq!(output.dims(), &[2, 5, 32]);
}

#[test]
fn test_attention_is_causal() {
    let device = test_device();
    let attn = create_attention(16, 2);

    let hidden = Tensor::randn(0f32, 1.0, (1, 4, 16), &device).unwrap();
    let changed_tail = Tensor::cat(
        &[
            hidden.narrow(1, 0, 3).unwrap(),
            Tensor::randn(0f32, 1.0, (1, 1, 16), &device).unwrap(),
        ],
        1,
    )
    .unwrap();

    let mask = causal_mask(4, &device).unwrap();
    let a = attn.forward(&hidden, &mask).unwrap();
    let b = attn.forward(&changed_tail, &mask).unwrap();

    // Rows before the changed position see identical inputs.
    let a_prefix: Vec<Vec<f32>> = a.i((0, 0..3)).unwrap().to_vec2().unwrap();
    let b_prefix: Vec<Vec<f32>> = b.i((0, 0..3)).unwrap().to_vec2().unwrap();
    for (row_a, row_b) in a_prefix.iter().zip(&b_prefix) {
        for (x, y) in row_a.iter().zip(row_b) {
            assert!((x - y).abs() < 1e-5);
        }
    }
}

#[test]
fn test_causal_mask_shape() {
    let mask = causal_mask(6, &test_device()).unwrap();
    assert_eq!(mask.dims(), &[6, 6]);

    let rows: Vec<Vec<f32>> = mask.to_vec2().unwrap();
    for (query, row) in rows.iter().enumerate() {
        let visible = row.iter().filter(|&&v| v == 0.0).count();
        assert_eq!(visible, query + 1);
    }
}
