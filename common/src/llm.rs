use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const EMBEDDING_DIMENSION: usize = 384;
pub const EMBEDDING_MODEL_NAME: &str = "mock-embedding-model";

/// Generador de embeddings mockeado pero determinista: el mismo texto
/// produce siempre el mismo vector, normalizado a norma 1.
#[derive(Debug, Clone)]
pub struct MockEmbeddingLlm {
    dimension: usize,
}

impl Default for MockEmbeddingLlm {
    fn default() -> Self {
        Self {
            dimension: EMBEDDING_DIMENSION,
        }
    }
}

impl MockEmbeddingLlm {
    pub fn generate_embedding(&self, text: &str) -> Vec<f64> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());

        let mut vector: Vec<f64> = (0..self.dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    pub fn generate_embeddings(&self, texts: &[String]) -> Vec<Vec<f64>> {
        texts.iter().map(|t| self.generate_embedding(t)).collect()
    }
}

/// LLM de chat mockeado: respuestas enlatadas, suficiente para cerrar el
/// circuito de la consulta RAG sin un modelo real.
#[derive(Debug, Clone, Default)]
pub struct MockChatLlm;

impl MockChatLlm {
    pub fn generate_response(&self, prompt: &str, context: &str) -> String {
        let prompt_lower = prompt.to_lowercase();

        if ["hola", "buenas", "hello", "hi"]
            .iter()
            .any(|g| prompt_lower.contains(g))
        {
            return "¡Hola! Soy un asistente RAG mockeado. ¿En qué puedo ayudarte?".to_string();
        }

        if context.is_empty() {
            return "Esta es una respuesta mockeada del sistema RAG. En producción acá \
                    estaría la respuesta real del LLM basada en el contexto."
                .to_string();
        }

        let resumen: String = context.chars().take(100).collect();
        format!(
            "Basado en el contexto recuperado: {}... Esta es una respuesta mockeada del \
             sistema RAG; en producción acá estaría la respuesta real del LLM.",
            resumen
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn el_mismo_texto_produce_el_mismo_vector() {
        let llm = MockEmbeddingLlm::default();
        assert_eq!(llm.generate_embedding("hola"), llm.generate_embedding("hola"));
        assert_ne!(llm.generate_embedding("hola"), llm.generate_embedding("chau"));
    }

    #[test]
    fn el_vector_tiene_norma_uno_y_dimension_384() {
        let llm = MockEmbeddingLlm::default();
        let v = llm.generate_embedding("un texto cualquiera");
        assert_eq!(v.len(), EMBEDDING_DIMENSION);

        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn la_respuesta_usa_el_contexto_cuando_hay() {
        let llm = MockChatLlm;
        let con = llm.generate_response("qué dice el documento?", "el documento habla de leases");
        assert!(con.contains("el documento habla de leases"));

        let sin = llm.generate_response("qué dice el documento?", "");
        assert!(!sin.contains("contexto recuperado"));
    }
}
