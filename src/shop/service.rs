use std::sync::Arc;

use tracing::{info, warn};

use super::{prompt, schema, validate, GenerationRequest, Shop, ShopDraft, ShopStore};
use crate::config::ValidationConfig;
use crate::error::{Result, ShopsmithError};
use crate::llm::{GenerateContext, LlmBackend};

/// Generates shops through a model backend and remembers the accepted ones.
pub struct ShopService {
    model: Arc<dyn LlmBackend>,
    limits: ValidationConfig,
    store: ShopStore,
}

impl ShopService {
    pub fn new(model: Arc<dyn LlmBackend>, limits: ValidationConfig) -> Self {
        Self {
            model,
            limits,
            store: ShopStore::new(),
        }
    }

    /// Prompt the model, validate its reply and store the shop if it passes.
    ///
    /// Upstream, malformed-response and validation failures are returned to
    /// the caller as-is; nothing is retried and nothing partial is stored.
    pub async fn generate(&self, request: GenerationRequest) -> Result<Shop> {
        request.check(&self.limits)?;

        let prompt = prompt::build(&request);
        let schema = schema::shop_schema(request.shop_type);

        info!(
            shop_type = %request.shop_type,
            items = request.number_of_items,
            level = request.level,
            backend = self.model.name(),
            "generating shop"
        );

        let ctx = GenerateContext {
            prompt: &prompt,
            schema: &schema,
        };
        let raw = self.model.generate(&ctx).await.inspect_err(|e| {
            warn!(err = %e, "model call failed");
        })?;

        let draft = ShopDraft::parse(&raw).inspect_err(|e| {
            warn!(err = %e, response_len = raw.len(), "model reply is not a shop document");
        })?;
        info!("shop generated and parsed, checking integrity");

        let issues = validate::validate(&draft, &request, &self.limits);
        if !issues.is_empty() {
            let summary: Vec<String> = issues.iter().map(ToString::to_string).collect();
            warn!(count = issues.len(), issues = ?summary, "generated shop rejected");
            return Err(ShopsmithError::Validation(issues));
        }

        let shop = draft.into_shop()?;
        self.store.append(shop.clone()).await;
        let stored = self.store.len().await;

        info!(
            id = shop.id,
            name = %shop.name,
            stored,
            "generated shop accepted"
        );

        Ok(shop)
    }

    /// Every accepted shop, oldest first.
    pub async fn list_all(&self) -> Vec<Shop> {
        self.store.list_all().await
    }

    pub fn backend_name(&self) -> &str {
        self.model.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedBackend;
    use crate::shop::ShopType;

    const THREE_WEAPONS: &str = r#"{
        "id": 1,
        "name": "The Rusty Blade",
        "shopkeeper_description": "A one-eyed smith with a booming laugh.",
        "goods": [
            { "name": "Longsword", "level": 5, "damage": 40 },
            { "name": "Dagger", "level": 5, "damage": 12 },
            { "name": "Warhammer", "level": 5, "damage": 55 }
        ]
    }"#;

    const TWO_WEAPONS: &str = r#"{
        "id": 2,
        "name": "Half Stocked",
        "shopkeeper_description": "Apologetic.",
        "goods": [
            { "name": "Longsword", "level": 5, "damage": 40 },
            { "name": "Dagger", "level": 5, "damage": 12 }
        ]
    }"#;

    fn service(backend: ScriptedBackend) -> (ShopService, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let service = ShopService::new(backend.clone(), ValidationConfig::default());
        (service, backend)
    }

    #[tokio::test]
    async fn valid_reply_is_stored_and_returned() {
        let (service, backend) = service(ScriptedBackend::replying(THREE_WEAPONS));

        let shop = service
            .generate(GenerationRequest::new(ShopType::Weapons, 3, 5))
            .await
            .unwrap();
        assert_eq!(shop.name, "The Rusty Blade");
        assert_eq!(shop.goods.len(), 3);
        assert!(shop.goods.iter().all(|i| i.level == 5 && i.damage.is_some()));

        assert_eq!(service.list_all().await, vec![shop]);
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("add damage values for the items"));
    }

    #[tokio::test]
    async fn generate_runs_on_spawned_task() {
        let (service, _) = service(ScriptedBackend::replying(THREE_WEAPONS));
        let service = Arc::new(service);

        let task = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .generate(GenerationRequest::new(ShopType::Weapons, 3, 5))
                    .await
            })
        };
        let shop = task.await.unwrap().unwrap();
        assert_eq!(service.list_all().await, vec![shop]);
    }

    #[tokio::test]
    async fn count_mismatch_is_rejected_and_not_stored() {
        let (service, _) = service(ScriptedBackend::replying(TWO_WEAPONS));

        let err = service
            .generate(GenerationRequest::new(ShopType::Weapons, 3, 5))
            .await
            .unwrap_err();
        match err {
            ShopsmithError::Validation(issues) => {
                assert!(issues.iter().any(|i| matches!(
                    i,
                    crate::shop::ValidationIssue::ItemCountMismatch { expected: 3, actual: 2 }
                )));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(service.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_is_named_error() {
        let (service, _) = service(ScriptedBackend::replying("I'm sorry, I can't do that."));

        let err = service
            .generate(GenerationRequest::new(ShopType::General, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopsmithError::MalformedResponse(_)));
        assert!(service.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn upstream_error_propagates_unchanged() {
        let backend = ScriptedBackend::new(vec![Err(ShopsmithError::Upstream("quota".into()))]);
        let (service, backend) = service(backend);

        let err = service
            .generate(GenerationRequest::new(ShopType::Armor, 2, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopsmithError::Upstream(ref m) if m == "quota"));
        assert_eq!(backend.call_count(), 1);
        assert!(service.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_model() {
        let (service, backend) = service(ScriptedBackend::replying(THREE_WEAPONS));

        let err = service
            .generate(GenerationRequest::new(ShopType::Weapons, 0, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopsmithError::InvalidRequest(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn accepted_shops_accumulate_in_order() {
        let backend = ScriptedBackend::new(vec![
            Ok(THREE_WEAPONS.to_string()),
            Ok(TWO_WEAPONS.to_string()),
            Ok(THREE_WEAPONS.replace("\"id\": 1", "\"id\": 3")),
        ]);
        let (service, _) = service(backend);
        let request = GenerationRequest::new(ShopType::Weapons, 3, 5);

        service.generate(request.clone()).await.unwrap();
        assert!(service.generate(request.clone()).await.is_err());
        let last = service.generate(request).await.unwrap();

        let all = service.list_all().await;
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(all.last(), Some(&last));
        assert_eq!(service.list_all().await, all);
    }
}
