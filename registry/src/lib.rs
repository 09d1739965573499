use std::sync::Arc;

use adapter::database::ConnectionPool;
use adapter::gateway::{
    deposit::DepositServiceImpl, payment::PaymentGatewayImpl, payout::PayoutGatewayImpl,
    PaymentApiClient,
};
use adapter::notifier::NotifierImpl;
use adapter::repository::{
    health::HealthCheckRepositoryImpl, item::ItemRepositoryImpl, rental::RentalRepositoryImpl,
    user::UserRepositoryImpl,
};
use kernel::clock::SystemClock;
use kernel::model::fee::FeeTable;
use kernel::repository::{
    health::HealthCheckRepository, item::ItemRepository, rental::RentalRepository,
    user::UserRepository,
};
use kernel::service::rental::RentalLifecycleService;
use shared::config::AppConfig;

// アプリケーション起動時に一度だけ組み立てて、各ハンドラへ配る DI コンテナ
#[derive(Clone)]
pub struct AppRegistry {
    health_check_repository: Arc<dyn HealthCheckRepository>,
    item_repository: Arc<dyn ItemRepository>,
    user_repository: Arc<dyn UserRepository>,
    rental_repository: Arc<dyn RentalRepository>,
    rental_lifecycle_service: Arc<RentalLifecycleService>,
}

impl AppRegistry {
    pub fn new(pool: ConnectionPool, app_config: AppConfig) -> Self {
        let health_check_repository = Arc::new(HealthCheckRepositoryImpl::new(pool.clone()));
        let item_repository: Arc<dyn ItemRepository> =
            Arc::new(ItemRepositoryImpl::new(pool.clone()));
        let user_repository = Arc::new(UserRepositoryImpl::new(pool.clone()));
        let rental_repository: Arc<dyn RentalRepository> =
            Arc::new(RentalRepositoryImpl::new(pool.clone()));

        let payment_api = PaymentApiClient::new(&app_config.payment);
        let rental_lifecycle_service = Arc::new(RentalLifecycleService::new(
            rental_repository.clone(),
            item_repository.clone(),
            Arc::new(NotifierImpl::new(pool.clone())),
            Arc::new(SystemClock),
            Arc::new(PaymentGatewayImpl::new(payment_api.clone())),
            Arc::new(PayoutGatewayImpl::new(payment_api.clone())),
            Arc::new(DepositServiceImpl::new(payment_api)),
            FeeTable::default(),
        ));

        Self {
            health_check_repository,
            item_repository,
            user_repository,
            rental_repository,
            rental_lifecycle_service,
        }
    }

    pub fn health_check_repository(&self) -> Arc<dyn HealthCheckRepository> {
        self.health_check_repository.clone()
    }

    pub fn item_repository(&self) -> Arc<dyn ItemRepository> {
        self.item_repository.clone()
    }

    pub fn user_repository(&self) -> Arc<dyn UserRepository> {
        self.user_repository.clone()
    }

    pub fn rental_repository(&self) -> Arc<dyn RentalRepository> {
        self.rental_repository.clone()
    }

    pub fn rental_lifecycle_service(&self) -> Arc<RentalLifecycleService> {
        self.rental_lifecycle_service.clone()
    }
}
