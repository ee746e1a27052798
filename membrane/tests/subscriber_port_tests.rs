// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane::config::{DataSegmentConfig, MemPoolConfig, SubscriberOptions};
use membrane::port::control_message::ControlMessage;
use membrane::port::subscriber_port::{
    SubscriberPortDaemon, SubscriberPortUser, SubscriptionState,
};
use membrane::service::ServiceDescription;
use membrane::testing::PortFactory;
use membrane_testing::assert_that;

fn factory() -> PortFactory {
    PortFactory::new(&DataSegmentConfig {
        mempool: vec![MemPoolConfig {
            size: 128,
            chunk_count: 16,
        }],
    })
}

fn service() -> ServiceDescription {
    ServiceDescription::new("a", "b", "c").unwrap()
}

fn manual_options() -> SubscriberOptions {
    SubscriberOptions {
        subscribe_on_create: false,
        history_request: 2,
        ..SubscriberOptions::default()
    }
}

#[test]
fn a_new_port_without_subscribe_on_create_emits_nothing() {
    let factory = factory();
    let port = factory.subscriber(service(), &manual_options());

    assert_that!(
        SubscriberPortUser::new(port).subscription_state(),
        eq SubscriptionState::NotSubscribed
    );
    assert_that!(SubscriberPortDaemon::new(port).try_get_control_message(), is_none);
}

#[test]
fn subscribe_emits_one_request_with_queue_and_history() {
    let factory = factory();
    let port = factory.subscriber(service(), &manual_options());
    let user = SubscriberPortUser::new(port);
    let daemon = SubscriberPortDaemon::new(port);

    user.subscribe();
    let message = daemon.try_get_control_message();
    assert_that!(message, is_some);

    match message.unwrap() {
        ControlMessage::Subscribe {
            service: requested_service,
            queue,
            history_request,
        } => {
            assert_that!(requested_service, eq service());
            assert_that!(history_request, eq 2);
            assert_that!(queue.is_null(), eq false);
        }
        message => panic!("expected a subscription request, got {message:?}"),
    }

    assert_that!(user.subscription_state(), eq SubscriptionState::SubscribeRequested);
    // no state change, no message
    assert_that!(daemon.try_get_control_message(), is_none);
}

#[test]
fn an_acknowledged_subscription_is_subscribed() {
    let factory = factory();
    let port = factory.subscriber(service(), &manual_options());
    let user = SubscriberPortUser::new(port);
    let daemon = SubscriberPortDaemon::new(port);

    user.subscribe();
    daemon.try_get_control_message().unwrap();
    daemon.dispatch_control_message(ControlMessage::Ack { service: service() });

    assert_that!(user.subscription_state(), eq SubscriptionState::Subscribed);
}

#[test]
fn a_refused_subscription_falls_back_to_not_subscribed() {
    let factory = factory();
    let port = factory.subscriber(service(), &manual_options());
    let user = SubscriberPortUser::new(port);
    let daemon = SubscriberPortDaemon::new(port);

    user.subscribe();
    daemon.try_get_control_message().unwrap();
    daemon.dispatch_control_message(ControlMessage::Nack { service: service() });

    assert_that!(user.subscription_state(), eq SubscriptionState::NotSubscribed);
}

#[test]
fn the_full_subscribe_unsubscribe_cycle_works() {
    let factory = factory();
    let port = factory.subscriber(service(), &manual_options());
    let user = SubscriberPortUser::new(port);
    let daemon = SubscriberPortDaemon::new(port);

    user.subscribe();
    daemon.try_get_control_message().unwrap();
    daemon.dispatch_control_message(ControlMessage::Ack { service: service() });

    user.unsubscribe();
    let message = daemon.try_get_control_message();
    assert_that!(message, is_some);
    match message.unwrap() {
        ControlMessage::Unsubscribe { .. } => (),
        message => panic!("expected an unsubscribe request, got {message:?}"),
    }
    assert_that!(user.subscription_state(), eq SubscriptionState::UnsubscribeRequested);

    daemon.dispatch_control_message(ControlMessage::Ack { service: service() });
    assert_that!(user.subscription_state(), eq SubscriptionState::NotSubscribed);
}

#[test]
fn an_unobserved_subscribe_unsubscribe_pair_collapses_into_nothing() {
    let factory = factory();
    let port = factory.subscriber(service(), &manual_options());
    let user = SubscriberPortUser::new(port);

    user.subscribe();
    user.unsubscribe();

    assert_that!(SubscriberPortDaemon::new(port).try_get_control_message(), is_none);
}
