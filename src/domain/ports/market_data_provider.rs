use crate::domain::entities::market::{CompanyInfo, HistoryPeriod, InstrumentRef, PriceBar, PriceQuote};
use crate::domain::error::ProviderError;
use crate::domain::ports::chain_provider::ChainProvider;
use async_trait::async_trait;

/// A market-data source. Providers only implement what their vendor offers;
/// the rest report `Unsupported` and the chain moves on.
#[async_trait]
pub trait DataProvider: ChainProvider {
    async fn get_current_price(&self, instrument: &InstrumentRef) -> Result<PriceQuote, ProviderError>;

    async fn get_historical_data(
        &self,
        _instrument: &InstrumentRef,
        _period: HistoryPeriod,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        Err(ProviderError::unsupported(self.name(), "historical data"))
    }

    async fn get_company_info(&self, _instrument: &InstrumentRef) -> Result<CompanyInfo, ProviderError> {
        Err(ProviderError::unsupported(self.name(), "company info"))
    }
}
