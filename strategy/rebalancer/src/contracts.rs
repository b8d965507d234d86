//! Registry and project contract interfaces generated via alloy's sol! macro.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IProjectRegistry {
        event ProjectCreated(address indexed project, address indexed token, address indexed stable);

        function projectCount() external view returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    interface IProject {
        function navPerShare() external view returns (uint256);
        function accrueInterest() external;
    }
}
