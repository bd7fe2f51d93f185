use bytes::Bytes;
use ethereum_types::{H256, U256};

use tessera_common::{Address, AddressKind};
use tessera_storage::{StateManager, Store};
use tessera_vm::vm::create_address;
use tessera_vm::{Environment, ExecutionResult, HaltReason, VM};

fn addr(last: u8) -> Address {
    let mut credential = [0u8; 28];
    credential[27] = last;
    Address::new(AddressKind::Enterprise, credential)
}

fn state() -> StateManager {
    StateManager::new(Store::in_memory()).unwrap()
}

fn env() -> Environment {
    Environment {
        chain_id: 88,
        block_number: 1,
        timestamp: 1_700_000_000,
        block_gas_limit: 30_000_000,
        base_fee: 1_000_000_000,
        ..Default::default()
    }
}

fn run_code(state: &mut StateManager, code: &[u8], gas: u64) -> tessera_vm::ExecutionReport {
    let contract = addr(0xC0);
    state.set_code(&contract, code).unwrap();
    let mut vm = VM::new(env(), state);
    vm.execute_call(addr(1), contract, Bytes::new(), 0, gas, false)
        .unwrap()
}

/// PUSH32 of an address word, for building call targets in bytecode.
fn push_address(code: &mut Vec<u8>, address: &Address) {
    code.push(0x7F);
    let mut word = [0u8; 32];
    word[4..].copy_from_slice(&address.credential);
    code.extend_from_slice(&word);
}

#[test]
fn add_and_return() {
    // PUSH1 2, PUSH1 3, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
    let code = [
        0x60, 0x02, 0x60, 0x03, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let report = run_code(&mut state(), &code, 100_000);
    assert!(report.is_success());
    assert_eq!(U256::from_big_endian(&report.output), U256::from(5));
}

#[test]
fn out_of_gas_consumes_the_whole_budget() {
    let code = [0x60, 0x01, 0x60, 0x02, 0x01, 0x00];
    let report = run_code(&mut state(), &code, 4);
    assert_eq!(report.result, ExecutionResult::Halted(HaltReason::OutOfGas));
    assert_eq!(report.gas_used, 4);
}

#[test]
fn unknown_opcode_halts() {
    // 0x21 is not an instruction in this machine.
    let report = run_code(&mut state(), &[0x21], 10_000);
    assert_eq!(
        report.result,
        ExecutionResult::Halted(HaltReason::InvalidOpcode(0x21))
    );
    assert_eq!(report.gas_used, 10_000);
}

#[test]
fn stack_underflow_halts() {
    let report = run_code(&mut state(), &[0x01], 10_000);
    assert_eq!(
        report.result,
        ExecutionResult::Halted(HaltReason::StackUnderflow)
    );
}

#[test]
fn jump_must_land_on_jumpdest() {
    // PUSH1 3, JUMP -> lands on 0xFE which is not a JUMPDEST.
    let report = run_code(&mut state(), &[0x60, 0x03, 0x56, 0xFE], 10_000);
    assert_eq!(report.result, ExecutionResult::Halted(HaltReason::BadJump));
}

#[test]
fn jump_over_a_trap() {
    // PUSH1 4, JUMP, INVALID, JUMPDEST, STOP
    let code = [0x60, 0x04, 0x56, 0xFE, 0x5B, 0x00];
    let report = run_code(&mut state(), &code, 10_000);
    assert!(report.is_success());
}

#[test]
fn jumpdest_inside_push_immediate_is_invalid() {
    // PUSH2 0x005B, PUSH1 1... the 0x5B at offset 2 is immediate data.
    let code = [0x61, 0x00, 0x5B, 0x50, 0x60, 0x02, 0x56, 0x00];
    let report = run_code(&mut state(), &code, 10_000);
    assert_eq!(report.result, ExecutionResult::Halted(HaltReason::BadJump));
}

#[test]
fn sstore_persists_and_sload_reads_back() {
    // PUSH1 5, PUSH1 0, SSTORE, STOP
    let mut state = state();
    let report = run_code(&mut state, &[0x60, 0x05, 0x60, 0x00, 0x55, 0x00], 100_000);
    assert!(report.is_success());

    let contract = addr(0xC0);
    assert_eq!(
        state
            .get_storage(&contract, &H256::from_low_u64_be(0))
            .unwrap(),
        H256::from_low_u64_be(5)
    );
}

#[test]
fn sstore_in_static_frame_is_a_violation() {
    let mut state = state();
    let contract = addr(0xC0);
    state
        .set_code(&contract, &[0x60, 0x01, 0x60, 0x00, 0x55])
        .unwrap();
    let mut vm = VM::new(env(), &mut state);
    let report = vm
        .execute_call(addr(1), contract, Bytes::new(), 0, 50_000, true)
        .unwrap();
    assert_eq!(
        report.result,
        ExecutionResult::Halted(HaltReason::StaticViolation)
    );
}

#[test]
fn revert_returns_payload_and_actual_gas() {
    // PUSH1 0x42, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, REVERT
    let code = [
        0x60, 0x42, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xFD,
    ];
    let report = run_code(&mut state(), &code, 100_000);
    assert_eq!(report.result, ExecutionResult::Revert);
    assert!(report.gas_used < 100_000);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(0x42));
}

#[test]
fn revert_rolls_back_storage() {
    // PUSH1 7, PUSH1 0, SSTORE, PUSH1 0, PUSH1 0, REVERT
    let mut state = state();
    let code = [
        0x60, 0x07, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xFD,
    ];
    let report = run_code(&mut state, &code, 100_000);
    assert_eq!(report.result, ExecutionResult::Revert);
    assert_eq!(
        state
            .get_storage(&addr(0xC0), &H256::from_low_u64_be(0))
            .unwrap(),
        H256::zero()
    );
}

#[test]
fn logs_are_recorded_with_topics() {
    // PUSH1 0xAA (topic), PUSH1 32 (size), PUSH1 0 (offset), LOG1, STOP
    let code = [0x60, 0xAA, 0x60, 0x20, 0x60, 0x00, 0xA1, 0x00];
    let report = run_code(&mut state(), &code, 100_000);
    assert!(report.is_success());
    assert_eq!(report.logs.len(), 1);
    let log = &report.logs[0];
    assert_eq!(log.address, addr(0xC0));
    assert_eq!(log.topics, vec![H256::from_low_u64_be(0xAA)]);
    assert_eq!(log.data.len(), 32);
}

#[test]
fn log_in_static_frame_is_a_violation() {
    let mut state = state();
    let contract = addr(0xC0);
    state
        .set_code(&contract, &[0x60, 0x00, 0x60, 0x00, 0xA0])
        .unwrap();
    let mut vm = VM::new(env(), &mut state);
    let report = vm
        .execute_call(addr(1), contract, Bytes::new(), 0, 50_000, true)
        .unwrap();
    assert_eq!(
        report.result,
        ExecutionResult::Halted(HaltReason::StaticViolation)
    );
}

#[test]
fn call_into_another_contract_places_return_data() {
    let mut state = state();
    let callee = addr(0x0B);
    // Returns the word 7.
    state
        .set_code(
            &callee,
            &[0x60, 0x07, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3],
        )
        .unwrap();

    // CALL(gas=50000, callee, value=0, args 0/0, ret 0/32), then RETURN(0,32).
    let mut code = vec![
        0x60, 0x20, // ret_size
        0x60, 0x00, // ret_offset
        0x60, 0x00, // args_size
        0x60, 0x00, // args_offset
        0x60, 0x00, // value
    ];
    push_address(&mut code, &callee);
    code.extend_from_slice(&[0x61, 0xC3, 0x50]); // PUSH2 50000 gas
    code.push(0xF1); // CALL
    code.extend_from_slice(&[0x50]); // POP status
    code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00, 0xF3]);

    let caller = addr(0xC0);
    state.set_code(&caller, &code).unwrap();
    let mut vm = VM::new(env(), &mut state);
    let report = vm
        .execute_call(addr(1), caller, Bytes::new(), 0, 500_000, false)
        .unwrap();
    assert!(report.is_success());
    assert_eq!(U256::from_big_endian(&report.output), U256::from(7));
}

#[test]
fn failed_inner_call_rolls_back_only_its_own_writes() {
    let mut state = state();
    let callee = addr(0x0B);
    // SSTORE 9 at slot 1, then REVERT.
    state
        .set_code(
            &callee,
            &[0x60, 0x09, 0x60, 0x01, 0x55, 0x60, 0x00, 0x60, 0x00, 0xFD],
        )
        .unwrap();

    // SSTORE 5 at slot 0, CALL callee, STOP.
    let mut code = vec![0x60, 0x05, 0x60, 0x00, 0x55];
    code.extend_from_slice(&[
        0x60, 0x00, // ret_size
        0x60, 0x00, // ret_offset
        0x60, 0x00, // args_size
        0x60, 0x00, // args_offset
        0x60, 0x00, // value
    ]);
    push_address(&mut code, &callee);
    code.extend_from_slice(&[0x61, 0xC3, 0x50]); // gas
    code.push(0xF1);
    code.push(0x00); // STOP (status word left on stack)

    let caller = addr(0xC0);
    state.set_code(&caller, &code).unwrap();
    let mut vm = VM::new(env(), &mut state);
    let report = vm
        .execute_call(addr(1), caller, Bytes::new(), 0, 500_000, false)
        .unwrap();
    assert!(report.is_success());

    // The outer write survived; the reverted inner write did not.
    assert_eq!(
        state.get_storage(&caller, &H256::from_low_u64_be(0)).unwrap(),
        H256::from_low_u64_be(5)
    );
    assert_eq!(
        state.get_storage(&callee, &H256::from_low_u64_be(1)).unwrap(),
        H256::zero()
    );
}

#[test]
fn create_deploys_code_and_bumps_the_nonce() {
    let mut state = state();
    let creator = addr(0x0A);
    state.add_balance(&creator, 1_000_000).unwrap();

    // Init code: store 5 at slot 0, return empty runtime.
    let init = [0x60, 0x05, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xF3];
    let mut vm = VM::new(env(), &mut state);
    let report = vm
        .execute_create(creator, 0, Bytes::copy_from_slice(&init), 200_000)
        .unwrap();

    assert!(report.is_success());
    let deployed = report.created_address.expect("created address");
    assert_eq!(deployed, create_address(&creator, 0));
    assert_eq!(state.get_nonce(&creator).unwrap(), 1);
    assert_eq!(
        state.get_storage(&deployed, &H256::from_low_u64_be(0)).unwrap(),
        H256::from_low_u64_be(5)
    );
}

#[test]
fn failed_create_keeps_the_nonce_increment() {
    let mut state = state();
    let creator = addr(0x0A);

    // Init code that reverts immediately.
    let init = [0x60, 0x00, 0x60, 0x00, 0xFD];
    let mut vm = VM::new(env(), &mut state);
    let report = vm
        .execute_create(creator, 0, Bytes::copy_from_slice(&init), 100_000)
        .unwrap();

    assert_eq!(report.result, ExecutionResult::Revert);
    assert!(report.created_address.is_none());
    assert_eq!(state.get_nonce(&creator).unwrap(), 1);
}

#[test]
fn call_to_account_without_code_succeeds_immediately() {
    let mut state = state();
    let mut vm = VM::new(env(), &mut state);
    let report = vm
        .execute_call(addr(1), addr(2), Bytes::new(), 0, 21_000, false)
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.gas_used, 0);
    assert!(report.output.is_empty());
}

#[test]
fn chainid_and_number_come_from_the_environment() {
    // CHAINID, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
    let code = [0x46, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
    let report = run_code(&mut state(), &code, 100_000);
    assert!(report.is_success());
    assert_eq!(U256::from_big_endian(&report.output), U256::from(88));
}
