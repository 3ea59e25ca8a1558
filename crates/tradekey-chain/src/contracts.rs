//! ABI bindings for the token contracts touched during provisioning.

use alloy::sol;

sol! {
    #[derive(Debug)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    #[derive(Debug)]
    interface IERC1155 {
        function isApprovedForAll(address account, address operator) external view returns (bool);
        function setApprovalForAll(address operator, bool approved) external;
    }
}
