use alloy::primitives::{Address, U256};
use alloy::providers::DynProvider;
use anyhow::Result;
use std::sync::Arc;

use crate::contracts::IERC20;

/// Balance and allowance reads for an ERC-20 token
#[derive(Clone)]
pub struct Erc20 {
    token: IERC20::IERC20Instance<Arc<DynProvider>>,
}

impl Erc20 {
    pub fn new(address: Address, provider: Arc<DynProvider>) -> Self {
        Self {
            token: IERC20::new(address, provider),
        }
    }

    pub async fn balance_of(&self, account: Address) -> Result<U256> {
        Ok(self.token.balanceOf(account).call().await?)
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        Ok(self.token.allowance(owner, spender).call().await?)
    }
}
