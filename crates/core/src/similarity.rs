/// Cosine similarity in [-1, 1]; zero-norm or mismatched inputs return 0.0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

pub fn average_embedding(embeddings: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = embeddings.first() else {
        return Vec::new();
    };

    let mut sum = vec![0f32; first.len()];
    for embedding in embeddings {
        for (slot, value) in sum.iter_mut().zip(embedding.iter()) {
            *slot += value;
        }
    }

    let count = embeddings.len() as f32;
    for slot in &mut sum {
        *slot /= count;
    }
    sum
}

/// Cosine between the averaged chunk embeddings of each document.
pub fn document_similarity(a: &[Vec<f32>], b: &[Vec<f32>]) -> f32 {
    cosine(&average_embedding(a), &average_embedding(b))
}

/// Similarity of each chunk to its predecessor; the first element is 1.0.
pub fn adjacent_similarities(embeddings: &[Vec<f32>]) -> Vec<f32> {
    embeddings
        .iter()
        .enumerate()
        .map(|(index, embedding)| {
            if index == 0 {
                1.0
            } else {
                cosine(embedding, &embeddings[index - 1])
            }
        })
        .collect()
}
