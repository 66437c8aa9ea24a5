//! Snapshot tests for the retrieval crate

#[cfg(test)]
mod snapshot_tests {
    use crate::{RagConfig, RetrievalService, Result, chunker};
    use async_trait::async_trait;
    use insta::assert_yaml_snapshot;
    use ka_core::Embedder;
    use tempfile::TempDir;

    /// Maps every text to its length and vowel count.
    struct ShapeEmbedder;

    #[async_trait]
    impl Embedder for ShapeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let vowels = text.chars().filter(|c| "aeiouAEIOU".contains(*c)).count();
            Ok(vec![text.chars().count() as f32, vowels as f32])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "shape"
        }
    }

    fn config(dir: &TempDir) -> RagConfig {
        RagConfig {
            embedding_dimension: 2,
            chunk_size: 30,
            chunk_overlap: 5,
            top_k: 2,
            embed_concurrency: 3,
            index_dir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn test_chunker_cuts_at_boundaries() {
        let text = "Remote work needs approval.\n\nEquipment is provided by IT. Return it when you leave.";
        let chunks = chunker::split(text, 30, 5).unwrap();

        assert_eq!(
            chunks,
            vec![
                "Remote work needs approval.\n\n",
                "al.\n\nEquipment is provided by ",
                "d by IT. Return it when you ",
                " you leave.",
            ]
        );
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let dir = TempDir::new().unwrap();
        let service = RetrievalService::new(ShapeEmbedder, config(&dir)).unwrap();
        service
            .index_document("7", "remote.txt", "Remote work needs approval from a manager first.")
            .await
            .unwrap();
        service
            .index_document("8", "it.txt", "Laptops are returned on the last day.")
            .await
            .unwrap();

        let counts = service.counts().await;
        let mut stats = service.stats().await;
        assert_eq!(stats["vectors"], counts.vectors);
        stats["vectors"] = "[rows]".into();
        stats["chunks"] = "[rows]".into();

        assert_yaml_snapshot!(stats, @r###"
        ---
        chunk_overlap: 5
        chunk_size: 30
        chunks: "[rows]"
        dimension: 2
        documents: 2
        embedding_model: shape
        vectors: "[rows]"
        "###);
    }

    #[tokio::test]
    async fn test_index_reference_snapshot() {
        let dir = TempDir::new().unwrap();
        let service = RetrievalService::new(ShapeEmbedder, config(&dir)).unwrap();

        let reference = service
            .index_document("42", "short.txt", "Short note.")
            .await
            .unwrap();

        assert_yaml_snapshot!(reference, @r###"
        ---
        doc_42_1_chunks
        "###);
    }
}
